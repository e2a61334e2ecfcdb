//! The demo app run by `runway run`: a heartbeat service plus a pool of
//! worker tasks, all stopped together when the app stops.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use runway_config::{Config, ConfigError, Opt, OptionType, Schema};
use runway_core::{Context, Exit, Runnable, Service, TaskGroup, async_trait};
use serde::Serialize;
use tracing::{debug, info};

/// Schema of the demo app's config.
pub fn schema() -> Result<Arc<Schema>, ConfigError> {
    let heartbeat = Schema::builder("Heartbeat")
        .doc("Periodic liveness log")
        .option(
            Opt::new("interval_ms")
                .ty(OptionType::Integer)
                .default(1000)
                .doc("Milliseconds between heartbeats"),
        )
        .build()?;

    Schema::builder("Demo")
        .doc("Demo application settings")
        .option(
            Opt::new("name")
                .ty(OptionType::String)
                .default("runway-demo")
                .doc("App name used in logs"),
        )
        .option(
            Opt::new("workers")
                .ty(OptionType::Integer)
                .default(2)
                .doc("Number of worker tasks"),
        )
        .option(
            Opt::new("tick_ms")
                .ty(OptionType::Integer)
                .default(250)
                .doc("Milliseconds between worker jobs"),
        )
        .option(Opt::section("heartbeat", heartbeat).doc("Heartbeat service"))
        .build()
}

/// Typed view over a loaded demo config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSettings {
    pub name: String,
    pub workers: u64,
    pub tick: Duration,
    pub heartbeat_interval: Duration,
}

impl DemoSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let heartbeat = config.section("heartbeat")?;
        Ok(Self {
            name: config.get_as("name")?,
            workers: config.get_as("workers")?,
            tick: positive_millis("tick_ms", config.get_as("tick_ms")?)?,
            heartbeat_interval: positive_millis(
                "heartbeat.interval_ms",
                heartbeat.get_as("interval_ms")?,
            )?,
        })
    }
}

fn positive_millis(field: &str, millis: u64) -> Result<Duration, ConfigError> {
    if millis == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

/// Logs a heartbeat on every interval tick.
pub struct Heartbeat {
    interval: Duration,
    counters: Arc<Counters>,
}

impl Heartbeat {
    pub fn new(interval: Duration, counters: Arc<Counters>) -> Self {
        Self { interval, counters }
    }
}

#[async_trait]
impl Runnable for Heartbeat {
    type Output = ();

    async fn initialize(&mut self, ctx: &Context) -> anyhow::Result<()> {
        debug!(service = %ctx.name(), interval_ms = self.interval.as_millis(), "heartbeat ready");
        Ok(())
    }

    async fn main(&mut self, ctx: &Context) -> anyhow::Result<()> {
        let app = ctx.app().map(|app| app.name().to_string()).unwrap_or_default();
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let beats = self.counters.heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
            info!(%app, beats, "heartbeat");
        }
    }

    async fn cleanup(&mut self, ctx: &Context, exit: Exit<'_>) -> anyhow::Result<()> {
        debug!(
            service = %ctx.name(),
            beats = self.counters.heartbeats.load(Ordering::Relaxed),
            ?exit,
            "heartbeat stopped"
        );
        Ok(())
    }
}

async fn worker(id: u64, tick: Duration, counters: Arc<Counters>) {
    let mut ticker = tokio::time::interval(tick);
    loop {
        ticker.tick().await;
        counters.jobs.fetch_add(1, Ordering::Relaxed);
        debug!(worker = id, "job done");
    }
}

/// Progress shared between the demo app and the command that runs it.
#[derive(Debug, Default)]
pub struct Counters {
    pub jobs: AtomicU64,
    pub heartbeats: AtomicU64,
}

/// Counters printed once the demo app has stopped.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub app: String,
    pub workers: u64,
    pub jobs: u64,
    pub heartbeats: u64,
}

impl Summary {
    pub fn new(settings: &DemoSettings, counters: &Counters) -> Self {
        Self {
            app: settings.name.clone(),
            workers: settings.workers,
            jobs: counters.jobs.load(Ordering::Relaxed),
            heartbeats: counters.heartbeats.load(Ordering::Relaxed),
        }
    }
}

/// Target of the demo app.
///
/// A stop request drops this future mid-await; the worker scope and the
/// heartbeat service are then torn down by the app before `run` returns.
pub async fn run(
    ctx: Context,
    duration: Option<Duration>,
    counters: Arc<Counters>,
) -> anyhow::Result<()> {
    let config = ctx
        .config::<Config>()
        .context("demo app started without a config")?;
    let settings = DemoSettings::from_config(&config)?;

    let mut heartbeat = Service::new(Heartbeat::new(
        settings.heartbeat_interval,
        Arc::clone(&counters),
    ));
    heartbeat.start()?;

    let workers = settings.workers;
    let tick = settings.tick;
    let stop = ctx.clone();
    TaskGroup::scope(|group| async move {
        for id in 0..workers {
            group.add_task(worker(id, tick, Arc::clone(&counters)));
        }
        info!(workers = group.len(), "workers started");
        match duration {
            Some(limit) => {
                tokio::select! {
                    () = stop.cancelled() => info!("stop requested"),
                    () = tokio::time::sleep(limit) => info!(?limit, "duration elapsed"),
                }
            }
            None => {
                stop.cancelled().await;
                info!("stop requested");
            }
        }
    })
    .await;

    heartbeat.shutdown().await?;
    Ok(())
}
