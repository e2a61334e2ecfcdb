//! Error types for runnables and their utilities.

use thiserror::Error;

/// Errors produced while starting, running or joining runnables.
#[derive(Debug, Error)]
pub enum RunError {
    /// `start` was called on a runner that already started.
    #[error("\"{name}\" can only be started once")]
    AlreadyStarted { name: String },

    /// `join` was called before `start`.
    #[error("\"{name}\" is not running")]
    NotRunning { name: String },

    /// The result of a runner was already taken by an earlier `join`.
    #[error("\"{name}\" was already joined")]
    AlreadyJoined { name: String },

    /// The runnable was stopped before it could finish.
    #[error("cancelled")]
    Cancelled,

    /// An app was run without a target.
    #[error("either pass a target or implement main")]
    MissingTarget,

    /// A service bound to one app was started inside another.
    #[error("\"{service}\" should run in \"{expected}\" but runs in \"{actual}\" instead")]
    WrongApp {
        service: String,
        expected: String,
        actual: String,
    },

    /// A lifecycle hook or spawned task panicked.
    #[error("\"{name}\" panicked: {message}")]
    Panicked { name: String, message: String },

    /// `wait_one` was given nothing to wait for.
    #[error("nothing to wait for")]
    NothingToWait,

    /// The tokio runtime could not be built.
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// A runner was started outside of a tokio runtime.
    #[error("\"{name}\" cannot start without a tokio runtime")]
    NoRuntime { name: String },

    /// A lifecycle hook returned an error.
    #[error(transparent)]
    Failed(anyhow::Error),
}

impl RunError {
    /// Convert a hook error, unwrapping it when it already is a `RunError`.
    pub(crate) fn from_hook(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(run_error) => run_error,
            Err(other) => Self::Failed(other),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<anyhow::Error> for RunError {
    fn from(error: anyhow::Error) -> Self {
        Self::from_hook(error)
    }
}

/// Best-effort message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
