use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use runway_config::{ConfigLoader, RuntimeConfig};
use runway_core::App;

use crate::cli::{GlobalFlags, RunArgs};
use crate::demo::{self, Counters, Summary};
use crate::output::output;

/// Handle `runway run`.
pub fn handle(
    args: &RunArgs,
    flags: &GlobalFlags,
    loader: &ConfigLoader,
    runtime: RuntimeConfig,
) -> anyhow::Result<()> {
    let schema = demo::schema()?;
    let mut config = loader
        .load_with_dotenv(&schema)
        .context("failed to load configuration")?;
    if let Some(workers) = args.workers {
        config.set("workers", workers)?;
    }
    let settings = demo::DemoSettings::from_config(&config)?;

    let duration = args.duration.map(Duration::from_secs);
    let format = flags.format;
    tracing::info!(
        app = %settings.name,
        workers = settings.workers,
        worker_threads = runtime.worker_threads,
        "starting demo app"
    );

    let counters = Arc::new(Counters::default());
    let shared = Arc::clone(&counters);
    App::with_target(move |ctx| demo::run(ctx, duration, shared))
        .named(settings.name.clone())
        .config(config)
        .runtime(runtime)
        .exec()
        .context("demo app failed")?;

    output(&Summary::new(&settings, &counters), format)
}
