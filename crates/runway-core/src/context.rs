//! Per-runnable context handed to every lifecycle hook.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::app::AppRef;
use crate::factory::{Factories, make_service};
use crate::phase::Phase;
use crate::runner::RunState;

/// Config attached to a runner or app, stored without its concrete type.
pub(crate) type ErasedConfig = Arc<dyn Any + Send + Sync>;

tokio::task_local! {
    static CURRENT_APP: AppRef;
}

/// App owning the current task, if any.
pub(crate) fn current_app() -> Option<AppRef> {
    CURRENT_APP.try_with(AppRef::clone).ok()
}

/// Run `fut` with `app` registered as the current app.
pub(crate) async fn with_app<F: Future>(app: Option<AppRef>, fut: F) -> F::Output {
    match app {
        Some(app) => CURRENT_APP.scope(app, fut).await,
        None => fut.await,
    }
}

/// `tokio::spawn` that keeps the current app visible inside the new task and
/// registers the task with the app.
pub(crate) fn spawn_in_app<F>(app: Option<AppRef>, fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match app {
        Some(app) => {
            let tasks = app.tasks().clone();
            tokio::spawn(tasks.track_future(CURRENT_APP.scope(app, fut)))
        }
        None => tokio::spawn(fut),
    }
}

/// Handle a runnable uses to inspect and control its own execution.
///
/// Cheap to clone; clones share the same runner state.
#[derive(Clone)]
pub struct Context {
    state: Arc<RunState>,
    config: Option<ErasedConfig>,
    factories: Arc<Factories>,
}

impl Context {
    pub(crate) const fn new(
        state: Arc<RunState>,
        config: Option<ErasedConfig>,
        factories: Arc<Factories>,
    ) -> Self {
        Self {
            state,
            config,
            factories,
        }
    }

    pub(crate) const fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Request cancellation of this runnable.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Mark the runnable aborted and stop it.
    pub fn abort(&self) {
        self.state.abort();
    }

    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.state.should_stop()
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Token cancelled when the runnable is asked to stop.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.state.token().clone()
    }

    /// Resolves once the runnable is asked to stop.
    #[must_use]
    pub fn cancelled(&self) -> WaitForCancellationFutureOwned {
        self.state.token().clone().cancelled_owned()
    }

    /// App this runnable belongs to.
    #[must_use]
    pub fn app(&self) -> Option<AppRef> {
        self.state.app()
    }

    /// Own config if it is a `C`, otherwise the app's config.
    #[must_use]
    pub fn config<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        self.config
            .clone()
            .and_then(|config| config.downcast::<C>().ok())
            .or_else(|| self.app().and_then(|app| app.config::<C>()))
    }

    /// Build a `T` from the runner's factories, then the app's, then `Default`.
    #[must_use]
    pub fn make_service<T: Default + 'static>(&self) -> T {
        match self.app() {
            Some(app) => make_service(&[&*self.factories, app.factories()]),
            None => make_service(&[&*self.factories]),
        }
    }

    /// Spawn a task that stays inside this runnable's app.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        spawn_in_app(self.app(), fut)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name())
            .field("should_stop", &self.should_stop())
            .finish_non_exhaustive()
    }
}
