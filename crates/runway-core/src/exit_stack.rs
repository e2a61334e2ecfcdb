//! A stack of async exit callbacks unwound in reverse order.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, error};

/// Something with an async enter and exit, like a connection or a lock.
#[async_trait]
pub trait AsyncContext: Send {
    type Output: Send;

    async fn enter(&mut self) -> anyhow::Result<Self::Output>;

    /// Called with the pending error, if any. Returning `true` suppresses it.
    async fn exit(&mut self, error: Option<&anyhow::Error>) -> anyhow::Result<bool>;
}

/// A single exit callback. Returning `true` suppresses the pending error.
#[async_trait]
pub trait AsyncExit: Send {
    async fn exit(self: Box<Self>, error: Option<&anyhow::Error>) -> anyhow::Result<bool>;
}

struct ContextExit<M>(M);

#[async_trait]
impl<M: AsyncContext> AsyncExit for ContextExit<M> {
    async fn exit(self: Box<Self>, error: Option<&anyhow::Error>) -> anyhow::Result<bool> {
        let Self(mut cm) = *self;
        cm.exit(error).await
    }
}

struct Callback<F>(F);

#[async_trait]
impl<F, Fut> AsyncExit for Callback<F>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn exit(self: Box<Self>, _error: Option<&anyhow::Error>) -> anyhow::Result<bool> {
        let Self(callback) = *self;
        callback().await?;
        Ok(false)
    }
}

/// Dynamic stack of exits, unwound last-in first-out.
///
/// ```no_run
/// use runway_core::AsyncExitStack;
///
/// # async fn demo() -> anyhow::Result<()> {
/// let mut stack = AsyncExitStack::new();
/// stack.callback(|| async {
///     tracing::info!("released");
///     Ok(())
/// });
/// let outcome = async { anyhow::Ok(42) }.await;
/// assert_eq!(stack.unwind(outcome).await?, Some(42));
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct AsyncExitStack {
    exits: Vec<Box<dyn AsyncExit>>,
}

impl AsyncExitStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `cm` and push its exit.
    ///
    /// # Errors
    ///
    /// Errors from `enter`; the exit is not pushed in that case.
    pub async fn enter_context<M>(&mut self, mut cm: M) -> anyhow::Result<M::Output>
    where
        M: AsyncContext + 'static,
    {
        let output = cm.enter().await?;
        self.exits.push(Box::new(ContextExit(cm)));
        Ok(output)
    }

    pub fn push<X: AsyncExit + 'static>(&mut self, exit: X) -> &mut Self {
        self.exits.push(Box::new(exit));
        self
    }

    /// Push a callback that runs on unwind and never suppresses errors.
    pub fn callback<F, Fut>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(Callback(callback))
    }

    /// Move every exit into a new stack, leaving this one empty.
    #[must_use]
    pub fn pop_all(&mut self) -> Self {
        Self {
            exits: std::mem::take(&mut self.exits),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exits.is_empty()
    }

    /// Run every exit, newest first, with `result` as the body's outcome.
    ///
    /// Returns `Ok(None)` when the body failed and an exit suppressed it.
    ///
    /// # Errors
    ///
    /// The body error if nothing suppressed it, or the last exit failure with
    /// the error it replaced attached as context.
    pub async fn unwind<T>(&mut self, result: anyhow::Result<T>) -> anyhow::Result<Option<T>> {
        let (value, mut pending) = match result {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };

        while let Some(exit) = self.exits.pop() {
            let outcome = exit.exit(pending.as_ref()).await;
            match outcome {
                Ok(true) => {
                    if let Some(error) = pending.take() {
                        debug!(error = %format!("{error:#}"), "exit suppressed error");
                    }
                }
                Ok(false) => {}
                Err(error) => {
                    pending = Some(match pending.take() {
                        Some(previous) => {
                            error.context(format!("while unwinding from: {previous:#}"))
                        }
                        None => error,
                    });
                }
            }
        }

        pending.map_or(Ok(value), Err)
    }

    /// Unwind with no body error.
    ///
    /// # Errors
    ///
    /// The last exit failure, as with [`unwind`](Self::unwind).
    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.unwind(Ok(())).await.map(|_| ())
    }
}

impl fmt::Debug for AsyncExitStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncExitStack")
            .field("pending", &self.exits.len())
            .finish()
    }
}

impl Drop for AsyncExitStack {
    fn drop(&mut self) {
        if !self.exits.is_empty() {
            error!(pending = self.exits.len(), "destroying exit stack with pending exits");
        }
    }
}
