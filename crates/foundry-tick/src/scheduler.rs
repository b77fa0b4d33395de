//! The tick loop and its public scheduling surface.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use foundry_budget::BudgetManager;
use foundry_metrics::MetricsRegistry;

use crate::async_task::AsyncTaskHandle;
use crate::deferred::DeferredTask;
use crate::error::TickError;
use crate::priority::Priority;
use crate::task::{LiveTasks, ReadyTask, TaskHandle, TaskId};

/// The fixed wall-clock duration of one tick.
pub const TICK_PERIOD: Duration = Duration::from_millis(50);

fn ticks_for(duration: Duration) -> u64 {
    if duration.is_zero() {
        return 0;
    }
    let ticks = duration.as_nanos().div_ceil(TICK_PERIOD.as_nanos());
    ticks as u64
}

fn period_ticks_for(period: Duration) -> u64 {
    if period.is_zero() {
        0
    } else {
        ticks_for(period).max(1)
    }
}

/// The tick-driven scheduler: a dedicated background thread that wakes
/// every [`TICK_PERIOD`], drains ready work under the global budget,
/// drains leftover-budget deferred work, and exposes an async
/// off-tick pool for work that shouldn't block the tick thread at all.
pub struct TickScheduler {
    current_tick: AtomicU64,
    seq: AtomicU64,
    live_tasks: LiveTasks,
    ready: Mutex<BinaryHeap<ReadyTask>>,
    deferred: Mutex<VecDeque<DeferredTask>>,
    shutdown: AtomicBool,
    tick_thread_id: Mutex<Option<ThreadId>>,
    metrics: MetricsRegistry,
    budget: Arc<BudgetManager>,
    runtime: tokio::runtime::Handle,
    join: Mutex<Option<thread::JoinHandle<()>>>,
}

impl TickScheduler {
    /// Starts the tick loop on a dedicated thread and returns a shared
    /// handle to the running scheduler. The async off-tick pool uses
    /// `runtime` to spawn work.
    pub fn start(
        metrics: MetricsRegistry,
        budget: Arc<BudgetManager>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Arc<Self>, TickError> {
        let scheduler = Arc::new(Self {
            current_tick: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            live_tasks: Arc::new(Mutex::new(HashMap::new())),
            ready: Mutex::new(BinaryHeap::new()),
            deferred: Mutex::new(VecDeque::new()),
            shutdown: AtomicBool::new(false),
            tick_thread_id: Mutex::new(None),
            metrics,
            budget,
            runtime,
            join: Mutex::new(None),
        });

        let loop_handle = {
            let scheduler = scheduler.clone();
            thread::Builder::new()
                .name("foundry-tick-loop".to_string())
                .spawn(move || scheduler.run_loop())
                .map_err(TickError::ThreadSpawn)?
        };
        *scheduler.join.lock().expect("poisoned") = Some(loop_handle);
        Ok(scheduler)
    }

    fn run_loop(self: Arc<Self>) {
        *self.tick_thread_id.lock().expect("poisoned") = Some(thread::current().id());
        tracing::debug!("tick loop started");

        // A small random offset on the very first wake desyncs this
        // scheduler's tick phase from any other instance started in the
        // same process tick, so two schedulers don't contend for CPU on
        // the same wall-clock boundary every tick for the life of the
        // process.
        let startup_jitter = Duration::from_nanos(rand::random_range(0..TICK_PERIOD.as_nanos() as u64 / 10));
        let mut next_wake = Instant::now() + startup_jitter + TICK_PERIOD;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let now = Instant::now();
            if next_wake > now {
                thread::sleep(next_wake - now);
            }
            // Keep the original cadence regardless of how late we woke;
            // a single slow tick should not trigger a burst of
            // back-to-back catch-up ticks.
            next_wake += TICK_PERIOD;

            self.run_one_tick();
        }
        tracing::debug!("tick loop stopped");
    }

    fn run_one_tick(&self) {
        let tick_start = Instant::now();
        let tick_no = self.current_tick.fetch_add(1, Ordering::AcqRel) + 1;
        self.budget.reset_tick();
        let global_budget = self.budget.global_budget().duration();

        self.run_ready_drain(tick_no, tick_start, global_budget);
        self.run_deferred_drain(tick_start, global_budget);

        let elapsed = tick_start.elapsed();
        self.metrics.record_tick_duration(elapsed.as_nanos() as u64);
        if elapsed > TICK_PERIOD {
            self.budget.report_tick_overrun(tick_no, elapsed.as_nanos() as u64);
        }
    }

    fn run_ready_drain(&self, tick_no: u64, tick_start: Instant, global_budget: Duration) {
        loop {
            let mut task = {
                let mut ready = self.ready.lock().expect("poisoned");
                match ready.peek() {
                    Some(top) if top.execute_tick <= tick_no => ready.pop().expect("just peeked"),
                    _ => return,
                }
            };

            if !self.is_live(task.task_id) {
                continue;
            }

            if task.priority != Priority::Critical
                && (tick_start.elapsed() >= global_budget || !self.budget.within_budget(&task.owner))
            {
                task.execute_tick = tick_no + 1;
                self.ready.lock().expect("poisoned").push(task);
                continue;
            }

            let owner = task.owner.clone();
            let ns = Self::run_isolated(&self.metrics, &mut task.job);
            self.metrics.timer(&format!("task.{owner}")).record(ns);
            self.budget.record_execution(&owner, ns);

            if task.period_ticks > 0 && self.is_live(task.task_id) {
                task.execute_tick = tick_no + task.period_ticks;
                self.ready.lock().expect("poisoned").push(task);
            } else {
                self.live_tasks.lock().expect("poisoned").remove(&task.task_id);
            }
        }
    }

    fn run_deferred_drain(&self, tick_start: Instant, global_budget: Duration) {
        let remaining = global_budget.saturating_sub(tick_start.elapsed());
        if remaining.is_zero() {
            return;
        }
        let budget_slice = remaining.min(global_budget / 4);
        let deadline = Instant::now() + budget_slice;

        loop {
            if Instant::now() >= deadline {
                return;
            }
            let mut task = {
                let mut deferred = self.deferred.lock().expect("poisoned");
                match deferred.pop_front() {
                    Some(task) => task,
                    None => return,
                }
            };

            if !self.is_live(task.task_id) {
                continue;
            }

            let owner = task.owner.clone();
            let ns = Self::run_isolated(&self.metrics, &mut task.job);
            self.metrics.timer(&format!("task.{owner}")).record(ns);
            self.budget.record_execution(&owner, ns);
            self.live_tasks.lock().expect("poisoned").remove(&task.task_id);
        }
    }

    /// Runs `job` with panics caught so a faulty task can never bring
    /// down the tick thread. Returns the wall-clock duration in
    /// nanoseconds.
    fn run_isolated(metrics: &MetricsRegistry, job: &mut (dyn FnMut() + Send)) -> u64 {
        let start = Instant::now();
        if std::panic::catch_unwind(AssertUnwindSafe(|| job())).is_err() {
            metrics.counter("scheduler.task.errors").increment();
        }
        start.elapsed().as_nanos() as u64
    }

    fn is_live(&self, task_id: TaskId) -> bool {
        self.live_tasks.lock().expect("poisoned").contains_key(&task_id)
    }

    /// Submits a synchronous task to run on the tick thread.
    ///
    /// `delay` is clamped to whole ticks (zero runs as soon as the next
    /// ready-drain sees it); `period` of zero means one-shot, otherwise
    /// it's clamped to at least one tick. Submission after [`shutdown`]
    /// has been called is rejected silently: the returned handle's
    /// `cancel` is a no-op.
    ///
    /// [`shutdown`]: TickScheduler::shutdown
    pub fn submit(
        &self,
        owner: impl Into<String>,
        delay: Duration,
        period: Duration,
        priority: Priority,
        job: impl FnMut() + Send + 'static,
    ) -> TaskHandle {
        let task_id = TaskId::next();
        if self.shutdown.load(Ordering::Relaxed) {
            return TaskHandle::inert(task_id);
        }

        let owner = owner.into();
        self.live_tasks.lock().expect("poisoned").insert(task_id, owner.clone());

        let delay_ticks = ticks_for(delay);
        let period_ticks = period_ticks_for(period);
        let execute_tick = self.current_tick.load(Ordering::Acquire) + delay_ticks;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        self.ready.lock().expect("poisoned").push(ReadyTask {
            execute_tick,
            priority,
            seq,
            task_id,
            owner,
            period_ticks,
            job: Box::new(job),
        });

        TaskHandle::live(task_id, self.live_tasks.clone())
    }

    /// Submits work that should run on the tick thread opportunistically,
    /// whenever a tick has leftover budget after its ready-drain phase.
    /// Deferred work has no tick affinity and never repeats.
    pub fn submit_deferred(
        &self,
        owner: impl Into<String>,
        priority: Priority,
        job: impl FnMut() + Send + 'static,
    ) -> TaskHandle {
        let task_id = TaskId::next();
        if self.shutdown.load(Ordering::Relaxed) {
            return TaskHandle::inert(task_id);
        }

        let owner = owner.into();
        self.live_tasks.lock().expect("poisoned").insert(task_id, owner.clone());
        self.deferred.lock().expect("poisoned").push_back(DeferredTask {
            task_id,
            owner,
            priority,
            job: Box::new(job),
        });
        TaskHandle::live(task_id, self.live_tasks.clone())
    }

    /// Submits a future to the async off-tick pool. Execution time is
    /// recorded against `owner` but never consumes tick budget.
    pub fn submit_async<T, F>(&self, owner: impl Into<String>, future: F) -> AsyncTaskHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let task_id = TaskId::next();
        if self.shutdown.load(Ordering::Relaxed) {
            return AsyncTaskHandle::inert(task_id);
        }

        let owner = owner.into();
        self.live_tasks.lock().expect("poisoned").insert(task_id, owner.clone());
        let metrics = self.metrics.clone();
        let live = self.live_tasks.clone();

        let join = self.runtime.spawn(async move {
            let start = Instant::now();
            let result = future.await;
            let ns = start.elapsed().as_nanos() as u64;
            metrics.timer(&format!("task.{owner}")).record(ns);
            live.lock().expect("poisoned").remove(&task_id);
            result
        });

        AsyncTaskHandle::new(task_id, self.live_tasks.clone(), join)
    }

    /// Cancels every live task owned by `owner`. Returns how many were
    /// removed. Covers ready, deferred, and async tasks alike, since
    /// cancellation is entirely a live-tasks-table operation.
    pub fn cancel_owner(&self, owner: &str) -> usize {
        let mut live = self.live_tasks.lock().expect("poisoned");
        let before = live.len();
        live.retain(|_, task_owner| task_owner != owner);
        before - live.len()
    }

    /// The monotonically increasing tick counter. Zero before the first
    /// tick has fired.
    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    /// Whether the calling thread is the tick loop thread.
    pub fn is_tick_thread(&self) -> bool {
        self.tick_thread_id
            .lock()
            .expect("poisoned")
            .is_some_and(|id| id == thread::current().id())
    }

    /// Signals the tick loop to stop and joins its thread. Submissions
    /// made after this point are rejected. Idempotent. The join itself
    /// is best-effort: a panicked tick thread is logged, not returned,
    /// since teardown must still proceed.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(join) = self.join.lock().expect("poisoned").take() {
            if join.join().is_err() {
                let err = TickError::ShutdownJoin;
                tracing::warn!(error = %err, "tick loop thread did not shut down cleanly");
            }
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as StdAtomicU64;
    use std::time::Duration as StdDuration;

    fn scheduler() -> Arc<TickScheduler> {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let handle = rt.handle().clone();
        std::mem::forget(rt);
        TickScheduler::start(
            foundry_metrics::MetricsRegistry::new(),
            Arc::new(foundry_budget::BudgetManager::new(foundry_metrics::MetricsRegistry::new())),
            handle,
        )
        .unwrap()
    }

    fn wait_until(deadline_ms: u64, mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + StdDuration::from_millis(deadline_ms);
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(StdDuration::from_millis(10));
        }
        predicate()
    }

    #[test]
    fn periodic_task_runs_roughly_once_per_period() {
        let sched = scheduler();
        let count = Arc::new(StdAtomicU64::new(0));
        let c = count.clone();
        let _handle = sched.submit(
            "counter",
            Duration::ZERO,
            TICK_PERIOD,
            Priority::Normal,
            move || {
                c.fetch_add(1, Ordering::Relaxed);
            },
        );

        assert!(wait_until(600, || count.load(Ordering::Relaxed) >= 3));
        sched.shutdown();
    }

    #[test]
    fn cancel_prevents_further_execution() {
        let sched = scheduler();
        let count = Arc::new(StdAtomicU64::new(0));
        let c = count.clone();
        let handle = sched.submit(
            "counter",
            Duration::ZERO,
            TICK_PERIOD,
            Priority::Normal,
            move || {
                c.fetch_add(1, Ordering::Relaxed);
            },
        );

        assert!(wait_until(300, || count.load(Ordering::Relaxed) >= 1));
        handle.cancel();
        let seen_at_cancel = count.load(Ordering::Relaxed);
        thread::sleep(StdDuration::from_millis(300));
        assert_eq!(count.load(Ordering::Relaxed), seen_at_cancel);
        sched.shutdown();
    }

    #[test]
    fn cancel_owner_removes_all_of_that_owners_tasks() {
        let sched = scheduler();
        let _a = sched.submit("unit-a", Duration::ZERO, Duration::ZERO, Priority::Normal, || {});
        let _b = sched.submit("unit-a", Duration::ZERO, Duration::ZERO, Priority::Normal, || {});
        let _c = sched.submit("unit-b", Duration::ZERO, Duration::ZERO, Priority::Normal, || {});
        let removed = sched.cancel_owner("unit-a");
        assert_eq!(removed, 2);
        sched.shutdown();
    }

    #[test]
    fn critical_task_runs_even_over_global_budget() {
        let sched = scheduler();
        sched.budget.set_global_budget(StdDuration::from_millis(1)).unwrap();
        let ran = Arc::new(StdAtomicU64::new(0));
        let r = ran.clone();
        let _handle = sched.submit(
            "vital",
            Duration::ZERO,
            Duration::ZERO,
            Priority::Critical,
            move || {
                r.fetch_add(1, Ordering::Relaxed);
            },
        );
        assert!(wait_until(300, || ran.load(Ordering::Relaxed) >= 1));
        sched.shutdown();
    }

    #[test]
    fn non_critical_task_over_its_own_unit_budget_is_deferred_to_next_tick() {
        let sched = scheduler();
        sched.budget.register("hog", StdDuration::from_nanos(1));
        // Pre-charge the unit past its (tiny) budget before the tick
        // thread ever gets a chance to reset it, so the very first
        // ready-drain this owner is eligible for sees it out of budget.
        sched.budget.record_execution("hog", StdDuration::from_millis(1).as_nanos() as u64);

        let ran = Arc::new(StdAtomicU64::new(0));
        let r = ran.clone();
        let _handle = sched.submit("hog", Duration::ZERO, Duration::ZERO, Priority::Normal, move || {
            r.fetch_add(1, Ordering::Relaxed);
        });

        // Not released on the tick where it was found out of budget...
        thread::sleep(StdDuration::from_millis(20));
        assert_eq!(ran.load(Ordering::Relaxed), 0);
        // ...but `reset_tick` clears the counter every tick, so it runs
        // on a later one.
        assert!(wait_until(300, || ran.load(Ordering::Relaxed) >= 1));
        sched.shutdown();
    }

    #[test]
    fn submission_after_shutdown_is_a_silent_no_op() {
        let sched = scheduler();
        sched.shutdown();
        let handle = sched.submit("late", Duration::ZERO, Duration::ZERO, Priority::Normal, || {});
        handle.cancel(); // must not panic even though nothing was ever live
        assert_eq!(sched.cancel_owner("late"), 0);
    }

    #[test]
    fn zero_and_negative_delay_clamp_to_zero_ticks() {
        assert_eq!(ticks_for(Duration::ZERO), 0);
    }

    #[test]
    fn sub_tick_period_clamps_to_one_tick() {
        assert_eq!(period_ticks_for(Duration::from_millis(1)), 1);
        assert_eq!(period_ticks_for(Duration::ZERO), 0);
    }

    #[test]
    fn current_tick_advances_while_running() {
        let sched = scheduler();
        assert!(wait_until(300, || sched.current_tick() >= 2));
        sched.shutdown();
    }
}
