//! Budget-aware tick scheduler for the Foundry runtime core.
//!
//! [`TickScheduler`] runs a dedicated background thread that wakes
//! every [`TICK_PERIOD`] and drains three kinds of work each wake:
//! ready tasks due this tick (a min-heap ordered by execute-tick, then
//! priority, then insertion order), leftover-budget deferred tasks, and
//! — off the tick thread entirely — async work submitted to the pool
//! backed by the caller's `tokio` runtime.
//!
//! Budgets are consulted, not enforced by preemption: a task already
//! running can overrun arbitrarily, but an over-budget tick pushes
//! every remaining non-[`Priority::Critical`] ready task to next tick
//! instead of running it late.

mod async_task;
mod deferred;
mod error;
mod priority;
mod scheduler;
mod task;

pub use async_task::AsyncTaskHandle;
pub use error::TickError;
pub use priority::Priority;
pub use scheduler::{TickScheduler, TICK_PERIOD};
pub use task::{TaskHandle, TaskId};
