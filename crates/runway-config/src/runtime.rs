//! Runtime settings for applications (`[runtime]` section).

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_handle_signals() -> bool {
    true
}

/// Default time given to blocking tasks when the runtime shuts down.
const fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

fn default_log_filter() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Worker threads for the tokio runtime. `0` uses tokio's default;
    /// `1` selects the current-thread scheduler.
    #[serde(default)]
    pub worker_threads: usize,

    /// Whether the app stops itself on SIGINT/SIGTERM.
    #[serde(default = "default_handle_signals")]
    pub handle_signals: bool,

    /// Grace period for blocking tasks when the runtime is dropped.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// `tracing` filter directive used when no env override is present.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            handle_signals: default_handle_signals(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            log_filter: default_log_filter(),
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub const fn is_multi_threaded(&self) -> bool {
        self.worker_threads != 1
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
