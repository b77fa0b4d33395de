//! Scheduled task identity, the ready-heap entry type, and task
//! handles.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::priority::Priority;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity for a task submitted to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Table of tasks the scheduler still considers live, mapping each id
/// to the owner that submitted it. Presence in this table is the sole
/// cancellation mechanism: removing an entry makes any still-queued
/// occurrence of that task a silent no-op the next time the ready-drain
/// phase pops it.
pub(crate) type LiveTasks = Arc<Mutex<HashMap<TaskId, String>>>;

/// A handle to a task submitted to the tick loop.
///
/// Cloning a handle is not supported — cancellation is a one-shot,
/// idempotent operation owned by whoever holds the handle.
pub struct TaskHandle {
    id: TaskId,
    live: Option<LiveTasks>,
}

impl TaskHandle {
    pub(crate) fn live(id: TaskId, live: LiveTasks) -> Self {
        Self { id, live: Some(live) }
    }

    /// A handle whose `cancel` is a no-op, returned when submission is
    /// rejected (e.g. the scheduler is shutting down).
    pub(crate) fn inert(id: TaskId) -> Self {
        Self { id, live: None }
    }

    /// The id this handle refers to.
    pub fn task_id(&self) -> TaskId {
        self.id
    }

    /// Cancels the task. Idempotent; cancelling an already-completed or
    /// already-cancelled task is harmless.
    pub fn cancel(&self) {
        if let Some(live) = &self.live {
            live.lock().expect("live task table poisoned").remove(&self.id);
        }
    }
}

/// One entry in the ready min-heap: a task waiting for its
/// `execute_tick` to arrive.
pub(crate) struct ReadyTask {
    pub execute_tick: u64,
    pub priority: Priority,
    pub seq: u64,
    pub task_id: TaskId,
    pub owner: String,
    pub period_ticks: u64,
    pub job: Box<dyn FnMut() + Send>,
}

impl PartialEq for ReadyTask {
    fn eq(&self, other: &Self) -> bool {
        self.execute_tick == other.execute_tick && self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for ReadyTask {}

impl PartialOrd for ReadyTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyTask {
    /// `BinaryHeap` is a max-heap; we want it to pop the task that is
    /// *next due*, so "greater" here means: lower `execute_tick` first,
    /// then higher priority, then earlier insertion (`seq`).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .execute_tick
            .cmp(&self.execute_tick)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
