//! The `Runnable` lifecycle and the `Runner` that drives it.
//!
//! A runnable goes through `initialize`, `main` and `cleanup` on its own tokio
//! task. The runner owns that task and exposes flags mirroring its progress.

use std::any::{Any, type_name};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, warn};

use crate::app::AppRef;
use crate::context::{Context, ErasedConfig, current_app, with_app};
use crate::error::{RunError, panic_message};
use crate::factory::{Factories, make_service};
use crate::phase::Phase;

/// A unit of async work with a three step lifecycle.
///
/// - `initialize` runs once and may stop the runnable before any work starts.
/// - `main` does the work and is raced against the stop signal.
/// - `cleanup` runs once after `main` returns, fails or is cancelled.
///
/// ```no_run
/// use async_trait::async_trait;
/// use runway_core::{Context, Exit, Runnable, Runner};
///
/// struct Ticker;
///
/// #[async_trait]
/// impl Runnable for Ticker {
///     type Output = ();
///
///     async fn main(&mut self, ctx: &Context) -> anyhow::Result<()> {
///         ctx.cancelled().await;
///         Ok(())
///     }
///
///     async fn cleanup(&mut self, _ctx: &Context, exit: Exit<'_>) -> anyhow::Result<()> {
///         tracing::info!(?exit, "ticker done");
///         Ok(())
///     }
/// }
///
/// # async fn demo() -> Result<(), runway_core::RunError> {
/// let mut runner = Runner::new(Ticker);
/// runner.start()?;
/// runner.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Runnable: Send + 'static {
    type Output: Send + 'static;

    /// Called once before `main`. Stopping here skips `main` and `cleanup`.
    async fn initialize(&mut self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    async fn main(&mut self, ctx: &Context) -> anyhow::Result<Self::Output>;

    /// Called once after `main`, however it ended.
    async fn cleanup(&mut self, _ctx: &Context, _exit: Exit<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// How `main` ended, as seen by `cleanup`.
#[derive(Debug, Clone, Copy)]
pub enum Exit<'a> {
    Success,
    Cancelled,
    Failed(&'a RunError),
}

impl Exit<'_> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// State shared between a runner, its task and every `Context` clone.
pub(crate) struct RunState {
    name: String,
    token: CancellationToken,
    should_stop: AtomicBool,
    started: AtomicBool,
    initialized: AtomicBool,
    aborted: AtomicBool,
    phase: Mutex<Phase>,
    app: OnceLock<AppRef>,
}

impl RunState {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            token: CancellationToken::new(),
            should_stop: AtomicBool::new(false),
            started: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            phase: Mutex::new(Phase::Created),
            app: OnceLock::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn stop(&self) {
        debug!(name = %self.name, "stop requested");
        if !self.should_stop.swap(true, Ordering::SeqCst) {
            self.token.cancel();
        }
    }

    pub(crate) fn abort(&self) {
        debug!(name = %self.name, "abort requested");
        self.aborted.store(true, Ordering::SeqCst);
        self.stop();
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn app(&self) -> Option<AppRef> {
        self.app.get().cloned()
    }

    pub(crate) fn set_app(&self, app: AppRef) {
        if self.app.set(app).is_err() {
            warn!(name = %self.name, "app already resolved");
        }
    }

    fn advance(&self, next: Phase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !phase.can_transition_to(next) {
            warn!(name = %self.name, from = %*phase, to = %next, "unexpected phase transition");
        }
        *phase = next;
    }

    fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
        debug!(name = %self.name, "initialized");
    }

    fn finish<T>(&self, phase: Phase, result: &Result<T, RunError>) {
        match result {
            Ok(_) => debug!(name = %self.name, "succeeded"),
            Err(RunError::Cancelled) => {
                if !self.should_stop() {
                    debug!(name = %self.name, "cancelled without a stop request");
                }
                debug!(name = %self.name, "cancelled");
            }
            Err(error) => {
                self.aborted.store(true, Ordering::SeqCst);
                debug!(name = %self.name, %error, "failed");
            }
        }
        self.should_stop.store(true, Ordering::SeqCst);
        self.token.cancel();
        self.advance(phase);
    }
}

/// Where a runner looks for its app once its task starts.
struct Launch {
    bound: Option<AppRef>,
    inherited: Option<AppRef>,
    service: bool,
}

impl Launch {
    fn resolve(self, name: &str) -> Result<Option<AppRef>, RunError> {
        match (self.bound, self.inherited) {
            (Some(bound), Some(current)) if self.service && !bound.ptr_eq(&current) => {
                Err(RunError::WrongApp {
                    service: name.to_string(),
                    expected: bound.name().to_string(),
                    actual: current.name().to_string(),
                })
            }
            (Some(bound), _) => Ok(Some(bound)),
            (None, current) => Ok(current),
        }
    }
}

type Caught<T> = Result<anyhow::Result<T>, Box<dyn Any + Send>>;

fn settle<T>(name: &str, outcome: Caught<T>) -> Result<T, RunError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(RunError::from_hook(error)),
        Err(payload) => Err(RunError::Panicked {
            name: name.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn terminal_phase<T>(result: &Result<T, RunError>) -> Phase {
    match result {
        Ok(_) => Phase::Succeeded,
        Err(RunError::Cancelled) => Phase::Cancelled,
        Err(_) => Phase::Failed,
    }
}

async fn drive<R: Runnable>(
    runnable: R,
    ctx: Context,
    launch: Launch,
) -> Result<R::Output, RunError> {
    let state = Arc::clone(ctx.state());
    let (phase, result) = match launch.resolve(state.name()) {
        Ok(app) => {
            if let Some(app) = &app {
                state.set_app(app.clone());
            }
            with_app(app, lifecycle(runnable, &ctx)).await
        }
        Err(error) => (Phase::Failed, Err(error)),
    };
    state.finish(phase, &result);
    result
}

async fn lifecycle<R: Runnable>(
    mut runnable: R,
    ctx: &Context,
) -> (Phase, Result<R::Output, RunError>) {
    let state = ctx.state();
    if state.should_stop() {
        return (Phase::Cancelled, Err(RunError::Cancelled));
    }

    state.advance(Phase::Initializing);
    let initialized = tokio::select! {
        biased;
        () = state.token().cancelled() => Err(RunError::Cancelled),
        outcome = AssertUnwindSafe(runnable.initialize(ctx)).catch_unwind() => {
            settle(state.name(), outcome)
        }
    };
    if let Err(error) = initialized {
        let phase = if error.is_cancelled() {
            Phase::Cancelled
        } else {
            Phase::Failed
        };
        return (phase, Err(error));
    }
    if state.should_stop() {
        return (Phase::Cancelled, Err(RunError::Cancelled));
    }
    state.mark_initialized();

    state.advance(Phase::Running);
    let result = tokio::select! {
        biased;
        () = state.token().cancelled() => Err(RunError::Cancelled),
        outcome = AssertUnwindSafe(runnable.main(ctx)).catch_unwind() => {
            settle(state.name(), outcome)
        }
    };

    state.advance(Phase::CleaningUp);
    let exit = match &result {
        Ok(_) => Exit::Success,
        Err(RunError::Cancelled) => Exit::Cancelled,
        Err(error) => Exit::Failed(error),
    };
    let cleaned = settle(
        state.name(),
        AssertUnwindSafe(runnable.cleanup(ctx, exit))
            .catch_unwind()
            .await,
    );

    let result = match (result, cleaned) {
        (result, Ok(())) => result,
        (Ok(_), Err(error)) => Err(error),
        (Err(error), Err(cleanup_error)) => {
            warn!(name = %state.name(), error = %cleanup_error, "cleanup failed");
            Err(error)
        }
    };
    (terminal_phase(&result), result)
}

/// Type name without module path or generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Owns a runnable and the tokio task executing it.
pub struct Runner<R: Runnable> {
    state: Arc<RunState>,
    runnable: Option<R>,
    config: Option<ErasedConfig>,
    factories: Arc<Factories>,
    bound: Option<AppRef>,
    service: bool,
    handle: Option<JoinHandle<Result<R::Output, RunError>>>,
    joined: bool,
}

impl<R: Runnable> Runner<R> {
    /// Runner named after the runnable's type.
    pub fn new(runnable: R) -> Self {
        Self::named(runnable, short_type_name::<R>())
    }

    pub fn named(runnable: R, name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RunState::new(name.into())),
            runnable: Some(runnable),
            config: None,
            factories: Arc::new(Factories::new()),
            bound: None,
            service: false,
            handle: None,
            joined: false,
        }
    }

    /// Attach a config visible through `Context::config`.
    #[must_use]
    pub fn with_config<C: Any + Send + Sync>(mut self, config: Arc<C>) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a constructor used by `make_service` before the app's.
    #[must_use]
    pub fn with_factory<T, F>(mut self, factory: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.factories).register(factory);
        self
    }

    pub(crate) fn with_shared_config(mut self, config: ErasedConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub(crate) fn with_factories(mut self, factories: Arc<Factories>) -> Self {
        self.factories = factories;
        self
    }

    pub(crate) fn bind(mut self, app: AppRef) -> Self {
        self.bound = Some(app);
        self
    }

    pub(crate) const fn as_service(mut self) -> Self {
        self.service = true;
        self
    }

    pub(crate) const fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.is_started()
    }

    /// Started and not finished yet.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.is_started() && !self.is_done()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase().is_terminal()
    }

    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.state.should_stop()
    }

    /// Whether `initialize` completed without a stop request.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    /// Whether the runnable was aborted or failed.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    /// App this runner is bound to, or the one it resolved when it started.
    #[must_use]
    pub fn app(&self) -> Option<AppRef> {
        self.bound.clone().or_else(|| self.state.app())
    }

    /// Own config if it is a `C`, otherwise the app's config.
    #[must_use]
    pub fn config<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        self.config
            .clone()
            .and_then(|config| config.downcast::<C>().ok())
            .or_else(|| self.app().and_then(|app| app.config::<C>()))
    }

    /// Build a `T` from this runner's factories, then the app's, then `Default`.
    #[must_use]
    pub fn make_service<T: Default + 'static>(&self) -> T {
        match self.app() {
            Some(app) => make_service(&[&*self.factories, app.factories()]),
            None => make_service(&[&*self.factories]),
        }
    }

    /// Context sharing this runner's state.
    #[must_use]
    pub fn context(&self) -> Context {
        Context::new(
            Arc::clone(&self.state),
            self.config.clone(),
            Arc::clone(&self.factories),
        )
    }

    /// Spawn the lifecycle onto the current tokio runtime.
    ///
    /// # Errors
    ///
    /// `AlreadyStarted` on a second call, `NoRuntime` outside of tokio.
    pub fn start(&mut self) -> Result<&mut Self, RunError> {
        if self.is_started() || self.runnable.is_none() {
            return Err(RunError::AlreadyStarted {
                name: self.name().to_string(),
            });
        }
        let Ok(runtime) = Handle::try_current() else {
            return Err(RunError::NoRuntime {
                name: self.name().to_string(),
            });
        };
        let Some(runnable) = self.runnable.take() else {
            return Err(RunError::AlreadyStarted {
                name: self.name().to_string(),
            });
        };

        self.state.started.store(true, Ordering::SeqCst);
        debug!(name = %self.name(), "started");

        let launch = Launch {
            bound: self.bound.clone(),
            inherited: current_app(),
            service: self.service,
        };
        let owner = launch.bound.clone().or_else(|| launch.inherited.clone());
        let span = tracing::debug_span!("runnable", name = %self.name());
        let task = drive(runnable, self.context(), launch).instrument(span);
        self.handle = Some(match owner {
            Some(app) => runtime.spawn(app.tasks().track_future(task)),
            None => runtime.spawn(task),
        });
        Ok(self)
    }

    /// Request cancellation. Has no effect once the runnable finished.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Mark the runnable aborted and stop it.
    pub fn abort(&self) {
        self.state.abort();
    }

    /// Wait for the runnable to finish and take its result.
    ///
    /// # Errors
    ///
    /// `NotRunning` before `start`, `AlreadyJoined` once the result was taken,
    /// otherwise whatever the lifecycle produced.
    pub async fn join(&mut self) -> Result<R::Output, RunError> {
        let Some(handle) = self.handle.as_mut() else {
            let name = self.name().to_string();
            return Err(if self.joined {
                RunError::AlreadyJoined { name }
            } else {
                RunError::NotRunning { name }
            });
        };

        let outcome = handle.await;
        self.handle = None;
        self.joined = true;

        match outcome {
            Ok(result) => result,
            Err(join_error) => match join_error.try_into_panic() {
                Ok(payload) => Err(RunError::Panicked {
                    name: self.name().to_string(),
                    message: panic_message(payload.as_ref()),
                }),
                Err(_) => Err(RunError::Cancelled),
            },
        }
    }

    /// Stop, then join, treating cancellation as a clean exit.
    ///
    /// # Errors
    ///
    /// Any error other than `Cancelled` returned by `join`.
    pub async fn shutdown(&mut self) -> Result<Option<R::Output>, RunError> {
        self.stop();
        match self.join().await {
            Ok(value) => Ok(Some(value)),
            Err(RunError::Cancelled) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl<R: Runnable> fmt::Debug for Runner<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.name())
            .field("phase", &self.phase())
            .field("should_stop", &self.should_stop())
            .finish_non_exhaustive()
    }
}

// A runner dropped with its task pending stops the task; that is only
// expected while its app is stopping.
impl<R: Runnable> Drop for Runner<R> {
    fn drop(&mut self) {
        if !self.handle.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let app_stopping = self
            .app()
            .or_else(current_app)
            .is_some_and(|app| app.should_stop());
        if app_stopping {
            debug!(name = %self.name(), "stopping with its app");
        } else {
            error!(name = %self.name(), "\"{}\" is destroyed with pending task", self.name());
        }
        self.state.stop();
    }
}
