//! Waiting on the first of several futures.

use std::future::Future;

use futures::future::select_all;

use crate::error::RunError;

/// Result of whichever future completes first.
///
/// The remaining futures are dropped; tokio tasks (`JoinHandle`, `GroupTask`)
/// keep running when their handle is dropped.
///
/// # Errors
///
/// The first future's error, or `RunError::NothingToWait` for empty input.
pub async fn wait_one<I, F, T, E>(futures: I) -> Result<T, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Unpin,
    E: From<RunError>,
{
    let futures: Vec<F> = futures.into_iter().collect();
    if futures.is_empty() {
        return Err(RunError::NothingToWait.into());
    }
    let (output, _index, _rest) = select_all(futures).await;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{self, BoxFuture, FutureExt};

    #[tokio::test]
    async fn empty_input_is_an_error() {
        let nothing: Vec<future::Ready<Result<(), RunError>>> = Vec::new();
        assert!(matches!(
            wait_one(nothing).await,
            Err(RunError::NothingToWait)
        ));
    }

    #[tokio::test]
    async fn ready_future_wins_over_pending() {
        let futures: Vec<BoxFuture<'static, Result<u8, RunError>>> =
            vec![future::pending().boxed(), future::ready(Ok(3)).boxed()];
        assert_eq!(wait_one(futures).await.unwrap(), 3);
    }
}
