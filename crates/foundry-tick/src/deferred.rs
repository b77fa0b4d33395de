//! The deferred queue: opportunistic work drained with whatever tick
//! budget is left over, distinct from the ready heap's own over-budget
//! requeue (which keeps a task's execute-tick and periodicity intact
//! and simply pushes it to next tick).

use crate::priority::Priority;
use crate::task::TaskId;

/// A task waiting in the deferred queue. Deferred items carry no
/// execute-tick and are never periodic: once they run, they're done.
/// Priority is carried for parity with the data model but the queue
/// itself is drained strictly FIFO.
pub(crate) struct DeferredTask {
    pub task_id: TaskId,
    pub owner: String,
    #[allow(dead_code)]
    pub priority: Priority,
    pub job: Box<dyn FnMut() + Send>,
}
