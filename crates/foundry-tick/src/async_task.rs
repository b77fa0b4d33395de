//! Handle type for work submitted to the async off-tick pool.

use crate::task::{LiveTasks, TaskId};

/// A handle to a task running on the async off-tick pool.
///
/// Unlike [`TaskHandle`](crate::task::TaskHandle), this carries the
/// underlying `tokio` join handle so a caller that used the callable
/// variant of submission can await the task's result.
pub struct AsyncTaskHandle<T> {
    id: TaskId,
    live: Option<LiveTasks>,
    join: Option<tokio::task::JoinHandle<T>>,
}

impl<T> AsyncTaskHandle<T> {
    pub(crate) fn new(id: TaskId, live: LiveTasks, join: tokio::task::JoinHandle<T>) -> Self {
        Self { id, live: Some(live), join: Some(join) }
    }

    /// A handle for a submission rejected during shutdown. `result`
    /// resolves to `None` immediately since no task ever ran.
    pub(crate) fn inert(id: TaskId) -> Self {
        Self { id, live: None, join: None }
    }

    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Best-effort cancellation: removes the task from the live-task
    /// table and aborts the underlying tokio task if it hasn't already
    /// completed.
    pub fn cancel(&self) {
        if let Some(live) = &self.live {
            live.lock().expect("live task table poisoned").remove(&self.id);
        }
        if let Some(join) = &self.join {
            join.abort();
        }
    }

    /// Awaits the task's result. Returns `None` if this handle was
    /// never backed by a real submission (shutdown rejection), or
    /// `Some(Err(_))` if the task panicked or was cancelled.
    pub async fn result(mut self) -> Option<Result<T, tokio::task::JoinError>> {
        match self.join.take() {
            Some(join) => Some(join.await),
            None => None,
        }
    }
}
