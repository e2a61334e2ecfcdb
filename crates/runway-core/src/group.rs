//! A group of tasks that is cancelled and awaited as a whole.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, error};

use crate::context::{current_app, spawn_in_app};
use crate::error::{RunError, panic_message};

/// Identifier of a task inside its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Default)]
struct GroupInner {
    // `None` until `add_task` stores the abort handle of the spawned task.
    tasks: Mutex<HashMap<TaskId, Option<AbortHandle>>>,
    departed: Notify,
    next_id: AtomicU64,
    // Set once `abort_all` ran; pending tasks are then already on their way out.
    aborted: AtomicBool,
}

impl GroupInner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, Option<AbortHandle>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        let aborted = *self.aborted.get_mut();
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            let mut pending: Vec<_> = tasks.keys().map(ToString::to_string).collect();
            pending.sort();
            if aborted {
                debug!(?pending, "task group dropped while its tasks are aborting");
            } else {
                error!(?pending, "destroying task group with pending tasks");
            }
        }
    }
}

/// Removes its task from the group when the task finishes or is aborted.
struct Departure {
    group: Weak<GroupInner>,
    id: TaskId,
}

impl Drop for Departure {
    fn drop(&mut self) {
        if let Some(group) = self.group.upgrade() {
            group.tasks().remove(&self.id);
            debug!(id = %self.id, "task done");
            group.departed.notify_waiters();
        }
    }
}

/// Tracks spawned tasks; finished tasks leave the group on their own.
///
/// Clones share the same set of tasks.
///
/// ```no_run
/// use std::time::Duration;
/// use runway_core::TaskGroup;
///
/// # async fn demo() {
/// TaskGroup::scope(|tasks| async move {
///     let task = tasks.add_task(tokio::time::sleep(Duration::from_millis(10)));
///     assert_eq!(tasks.len(), 1);
///     task.await.unwrap();
///     assert!(tasks.is_empty());
/// })
/// .await;
/// # }
/// ```
#[derive(Clone, Default)]
pub struct TaskGroup {
    inner: Arc<GroupInner>,
}

impl TaskGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a fresh group, then shut the group down.
    ///
    /// If the scope future is dropped before it completes (for example when
    /// its runnable is stopped), every pending task is aborted.
    pub async fn scope<F, Fut, T>(f: F) -> T
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = T>,
    {
        let group = Self::new();
        let guard = AbortOnDrop(group.clone());
        let output = f(group.clone()).await;
        group.shutdown().await;
        drop(guard);
        output
    }

    /// Spawn `fut` inside the current app and track it.
    pub fn add_task<F>(&self, fut: F) -> GroupTask<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let id = TaskId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.tasks().insert(id, None);

        let departure = Departure {
            group: Arc::downgrade(&self.inner),
            id,
        };
        let handle = spawn_in_app(current_app(), async move {
            let _departure = departure;
            fut.await
        });

        // The task may already be gone, in which case its slot is too.
        if let Some(slot) = self.inner.tasks().get_mut(&id) {
            *slot = Some(handle.abort_handle());
        }
        // A concurrent `shutdown` skipped the empty slot; let it rescan.
        self.inner.departed.notify_waiters();
        debug!(%id, "task added");
        GroupTask { id, handle }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.tasks().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.tasks().is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.inner.tasks().contains_key(&id)
    }

    /// Snapshot of the pending task ids.
    #[must_use]
    pub fn ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<_> = self.inner.tasks().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Abort every pending task without waiting for them to leave.
    ///
    /// Returns whether any task was still pending.
    pub fn abort_all(&self) -> bool {
        self.inner.aborted.store(true, Ordering::SeqCst);
        let tasks = self.inner.tasks();
        for (id, handle) in tasks.iter() {
            if let Some(handle) = handle {
                debug!(%id, "cancelling task");
                handle.abort();
            }
        }
        !tasks.is_empty()
    }

    /// Cancel every pending task and wait until all of them left the group.
    pub async fn shutdown(&self) {
        loop {
            let departed = self.inner.departed.notified();
            tokio::pin!(departed);
            departed.as_mut().enable();

            if !self.abort_all() {
                return;
            }
            departed.await;
        }
    }
}

/// Aborts the group's pending tasks when a `scope` is dropped mid-await.
struct AbortOnDrop(TaskGroup);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.0.abort_all() {
            debug!("task group scope dropped with pending tasks");
        }
    }
}

impl fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup")
            .field("pending", &self.ids())
            .finish()
    }
}

/// Handle to a task of a [`TaskGroup`].
///
/// Resolves to the task's output, `RunError::Cancelled` if it was aborted, or
/// `RunError::Panicked`. Dropping it leaves the task running.
#[derive(Debug)]
pub struct GroupTask<T> {
    id: TaskId,
    handle: JoinHandle<T>,
}

impl<T> GroupTask<T> {
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn join_error(id: TaskId, error: JoinError) -> RunError {
    match error.try_into_panic() {
        Ok(payload) => RunError::Panicked {
            name: id.to_string(),
            message: panic_message(payload.as_ref()),
        },
        Err(_) => RunError::Cancelled,
    }
}

impl<T> Future for GroupTask<T> {
    type Output = Result<T, RunError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|outcome| outcome.map_err(|error| join_error(id, error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_display_with_prefix() {
        assert_eq!(TaskId(3).to_string(), "task-3");
        assert!(TaskId(1) < TaskId(2));
    }

    #[tokio::test]
    async fn finished_task_leaves_before_handle_resolves() {
        let group = TaskGroup::new();
        let task = group.add_task(async { 5 });
        let id = task.id();
        assert!(group.contains(id));

        assert_eq!(task.await.unwrap(), 5);
        assert!(!group.contains(id));
        assert!(group.is_empty());
    }
}
