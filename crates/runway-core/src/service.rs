//! Runnables that belong to an app.

use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::app::AppRef;
use crate::runner::{Runnable, Runner};

/// A runner bound to an app.
///
/// Without an explicit [`bind`](Self::bind) the app is resolved from the task
/// that starts the service. A service bound to one app and started inside
/// another fails with `RunError::WrongApp`.
#[derive(Debug)]
pub struct Service<R: Runnable> {
    runner: Runner<R>,
}

impl<R: Runnable> Service<R> {
    pub fn new(runnable: R) -> Self {
        Self {
            runner: Runner::new(runnable).as_service(),
        }
    }

    pub fn named(runnable: R, name: impl Into<String>) -> Self {
        Self {
            runner: Runner::named(runnable, name).as_service(),
        }
    }

    /// Bind the service to `app` instead of resolving it on start.
    #[must_use]
    pub fn bind(self, app: AppRef) -> Self {
        Self {
            runner: self.runner.bind(app),
        }
    }

    #[must_use]
    pub fn with_config<C: Any + Send + Sync>(self, config: Arc<C>) -> Self {
        Self {
            runner: self.runner.with_config(config),
        }
    }

    #[must_use]
    pub fn with_factory<T, F>(self, factory: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            runner: self.runner.with_factory(factory),
        }
    }

    #[must_use]
    pub const fn runner(&self) -> &Runner<R> {
        &self.runner
    }
}

impl<R: Runnable> Deref for Service<R> {
    type Target = Runner<R>;

    fn deref(&self) -> &Self::Target {
        &self.runner
    }
}

impl<R: Runnable> DerefMut for Service<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.runner
    }
}
