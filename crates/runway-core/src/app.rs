//! The root runnable of an application.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use runway_config::{Config, RuntimeConfig};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::context::{Context, ErasedConfig, current_app, with_app};
use crate::error::RunError;
use crate::factory::{Factories, make_service};
use crate::runner::{RunState, Runnable, Runner};

type Target = Box<dyn FnOnce(Context) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Root runnable: owns config, service factories and signal handling.
///
/// Everything started from inside the app's target through runway (runners,
/// services, task groups, `Context::spawn`) sees it as the current app, and
/// `run` waits for those tasks before returning.
///
/// ```no_run
/// use runway_core::App;
///
/// fn main() -> Result<(), runway_core::RunError> {
///     App::<()>::with_target(|ctx| async move {
///         tracing::info!(app = %ctx.name(), "running");
///         ctx.cancelled().await;
///         Ok(())
///     })
///     .named("demo")
///     .exec()
/// }
/// ```
pub struct App<C = Config> {
    name: String,
    config: Option<Arc<C>>,
    target: Option<Target>,
    factories: Factories,
    runtime: RuntimeConfig,
}

impl<C: Any + Send + Sync> Default for App<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Any + Send + Sync> App<C> {
    /// App without a target. Running it fails with `MissingTarget`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "App".to_string(),
            config: None,
            target: None,
            factories: Factories::new(),
            runtime: RuntimeConfig::default(),
        }
    }

    /// App whose `main` awaits `target`.
    #[must_use]
    pub fn with_target<F, Fut>(target: F) -> Self
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut app = Self::new();
        app.target = Some(Box::new(move |ctx| Box::pin(target(ctx))));
        app
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn config(self, config: C) -> Self {
        self.shared_config(Arc::new(config))
    }

    #[must_use]
    pub fn shared_config(mut self, config: Arc<C>) -> Self {
        self.config = Some(config);
        self
    }

    /// Register the constructor `make_service` uses for `T`.
    #[must_use]
    pub fn factory<T, F>(mut self, factory: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories.register(factory);
        self
    }

    #[must_use]
    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get_config(&self) -> Option<&Arc<C>> {
        self.config.as_ref()
    }

    #[must_use]
    pub const fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Build a `T` from the app's factories, or `T::default()`.
    #[must_use]
    pub fn make_service<T: Default + 'static>(&self) -> T {
        make_service(&[&self.factories])
    }

    /// App owning the current task.
    #[must_use]
    pub fn current() -> Option<AppRef> {
        AppRef::current()
    }

    /// Run on the current tokio runtime until the target finishes or the app
    /// is stopped.
    ///
    /// # Errors
    ///
    /// Any lifecycle error except cancellation, which counts as a clean exit.
    pub async fn run(self) -> Result<(), RunError> {
        let Self {
            name,
            config,
            target,
            factories,
            runtime,
        } = self;

        let factories = Arc::new(factories);
        let erased = config.map(|config| -> ErasedConfig { config });
        let main = AppMain {
            target,
            handle_signals: runtime.handle_signals,
            signals: None,
        };
        let runner = Runner::named(main, name).with_factories(Arc::clone(&factories));
        let mut runner = match &erased {
            Some(config) => runner.with_shared_config(Arc::clone(config)),
            None => runner,
        };

        let app = AppRef {
            inner: Arc::new(AppInner {
                name: runner.name().to_string(),
                config: erased,
                factories,
                state: Arc::clone(runner.state()),
                tasks: TaskTracker::new(),
            }),
        };
        runner = runner.bind(app.clone());

        let result = with_app(Some(app.clone()), async {
            runner.start()?;
            runner.join().await
        })
        .await;
        app.drain(runtime.shutdown_timeout()).await;

        match result {
            Ok(()) | Err(RunError::Cancelled) => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Build a tokio runtime from the runtime config and block on `run`.
    ///
    /// # Errors
    ///
    /// `Runtime` if the runtime cannot be built, otherwise as `run`.
    pub fn exec(self) -> Result<(), RunError> {
        let runtime = build_runtime(&self.runtime)?;
        let timeout = self.runtime.shutdown_timeout();
        let result = runtime.block_on(self.run());
        runtime.shutdown_timeout(timeout);
        result
    }
}

impl<C> fmt::Debug for App<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("has_target", &self.target.is_some())
            .field("factories", &self.factories)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

fn build_runtime(config: &RuntimeConfig) -> std::io::Result<Runtime> {
    let mut builder = if config.is_multi_threaded() {
        Builder::new_multi_thread()
    } else {
        Builder::new_current_thread()
    };
    if config.worker_threads > 1 {
        builder.worker_threads(config.worker_threads);
    }
    builder.enable_all().build()
}

struct AppMain {
    target: Option<Target>,
    handle_signals: bool,
    signals: Option<JoinHandle<()>>,
}

#[async_trait]
impl Runnable for AppMain {
    type Output = ();

    async fn initialize(&mut self, ctx: &Context) -> anyhow::Result<()> {
        if self.handle_signals {
            let ctx = ctx.clone();
            self.signals = Some(tokio::spawn(async move {
                shutdown_signal().await;
                info!(app = %ctx.name(), "shutdown signal received");
                ctx.stop();
            }));
        }
        Ok(())
    }

    async fn main(&mut self, ctx: &Context) -> anyhow::Result<()> {
        let target = self.target.take().ok_or(RunError::MissingTarget)?;
        target(ctx.clone()).await
    }
}

impl Drop for AppMain {
    fn drop(&mut self) {
        if let Some(signals) = self.signals.take() {
            signals.abort();
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            debug!(%error, "SIGTERM handler unavailable, using ctrl-c only");
            ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        () = ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        debug!(%error, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

struct AppInner {
    name: String,
    config: Option<ErasedConfig>,
    factories: Arc<Factories>,
    state: Arc<RunState>,
    tasks: TaskTracker,
}

/// Shared handle to a running app.
#[derive(Clone)]
pub struct AppRef {
    inner: Arc<AppInner>,
}

impl AppRef {
    /// App owning the current task.
    ///
    /// Warns outside of a tokio runtime.
    #[must_use]
    pub fn current() -> Option<Self> {
        if Handle::try_current().is_err() {
            warn!("there is no current tokio runtime");
            return None;
        }
        let app = current_app();
        if app.is_none() {
            debug!("there is no active app in this task");
        }
        app
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The app's config if it is a `C`.
    #[must_use]
    pub fn config<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        self.inner
            .config
            .clone()
            .and_then(|config| config.downcast::<C>().ok())
    }

    pub(crate) fn factories(&self) -> &Factories {
        &self.inner.factories
    }

    /// Tracks every task spawned inside the app.
    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.inner.tasks
    }

    /// Wait up to `timeout` for the app's tasks once its target is gone.
    async fn drain(&self, timeout: Duration) {
        let tasks = self.tasks();
        tasks.close();
        if tokio::time::timeout(timeout, tasks.wait()).await.is_err() {
            warn!(
                app = %self.name(),
                pending = tasks.len(),
                "tasks still running after the app stopped"
            );
        }
    }

    /// Build a `T` from the app's factories, or `T::default()`.
    #[must_use]
    pub fn make_service<T: Default + 'static>(&self) -> T {
        make_service(&[self.factories()])
    }

    pub fn stop(&self) {
        self.inner.state.stop();
    }

    pub fn abort(&self) {
        self.inner.state.abort();
    }

    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.inner.state.should_stop()
    }

    /// Whether both handles point to the same app.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRef")
            .field("name", &self.name())
            .field("factories", self.factories())
            .finish_non_exhaustive()
    }
}
