//! The budget manager: per-unit tracking, global budget, overrun
//! reporting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use foundry_metrics::MetricsRegistry;

use crate::error::BudgetError;
use crate::global::GlobalTickBudget;
use crate::unit::{DefaultBucket, UnitBudget};

/// A snapshot of one unit's accounting, for diagnostics/tests.
#[derive(Debug, Clone, Copy)]
pub struct UnitBudgetSnapshot {
    pub budget_ns: u64,
    pub current_tick_ns: u64,
    pub total_ns: u64,
    pub over_budget_count: u64,
}

/// Tracks nanoseconds consumed per registered unit per tick, the global
/// tick budget, and tick overrun reporting.
///
/// Budgets are soft: there's no preemption of running work. A task
/// already executing may exceed its budget arbitrarily — the budget
/// only gates whether the *next* candidate is released from the ready
/// queue.
pub struct BudgetManager {
    metrics: MetricsRegistry,
    global_budget: RwLock<GlobalTickBudget>,
    units: RwLock<HashMap<String, UnitBudget>>,
    default_bucket: DefaultBucket,
    overrun_count: AtomicU64,
    last_overrun_tick: AtomicU64,
    last_overrun_at: RwLock<Option<SystemTime>>,
}

impl BudgetManager {
    /// Creates a manager with the default 45ms global budget and no
    /// registered units.
    pub fn new(metrics: MetricsRegistry) -> Self {
        Self {
            metrics,
            global_budget: RwLock::new(GlobalTickBudget::default()),
            units: RwLock::new(HashMap::new()),
            default_bucket: DefaultBucket::new(),
            overrun_count: AtomicU64::new(0),
            last_overrun_tick: AtomicU64::new(0),
            last_overrun_at: RwLock::new(None),
        }
    }

    /// Registers `unit_id` with a per-tick budget. Registering an
    /// already-registered id replaces its budget and resets its
    /// counters.
    pub fn register(&self, unit_id: &str, budget: Duration) {
        let mut units = self.units.write().expect("poisoned");
        units.insert(unit_id.to_string(), UnitBudget::new(budget.as_nanos() as u64));
    }

    /// Returns the remaining nanoseconds this tick for `unit_id`.
    /// Unregistered units report the global budget's full span minus
    /// nothing, since they're never gated.
    pub fn remaining(&self, unit_id: &str) -> Duration {
        let units = self.units.read().expect("poisoned");
        match units.get(unit_id) {
            Some(unit) => Duration::from_nanos(unit.remaining_ns()),
            None => self.global_budget.read().expect("poisoned").duration(),
        }
    }

    /// Returns whether `unit_id` currently has budget remaining.
    /// Unregistered units are always within budget.
    pub fn within_budget(&self, unit_id: &str) -> bool {
        let units = self.units.read().expect("poisoned");
        match units.get(unit_id) {
            Some(unit) => unit.within_budget(),
            None => true,
        }
    }

    /// Records `ns` nanoseconds of execution against `unit_id`.
    /// Unregistered units charge to the default bucket and never
    /// increment the over-budget counter.
    pub fn record_execution(&self, unit_id: &str, ns: u64) {
        let units = self.units.read().expect("poisoned");
        match units.get(unit_id) {
            Some(unit) => {
                let crossed = unit.record(ns);
                if crossed {
                    tracing::debug!(unit_id, ns, "unit crossed its per-tick budget");
                }
            }
            None => self.default_bucket.record(ns),
        }
        self.metrics
            .timer(&format!("budget.unit.{unit_id}"))
            .record(ns);
    }

    /// Resets every registered unit's current-tick counter (and the
    /// default bucket's) to zero. Called once at the start of every
    /// tick.
    pub fn reset_tick(&self) {
        let units = self.units.read().expect("poisoned");
        for unit in units.values() {
            unit.reset_tick();
        }
        self.default_bucket.reset_tick();
    }

    /// The current global tick budget.
    pub fn global_budget(&self) -> GlobalTickBudget {
        *self.global_budget.read().expect("poisoned")
    }

    /// Replaces the global tick budget. Rejects values outside
    /// `[1ms, 100ms)`.
    pub fn set_global_budget(&self, duration: Duration) -> Result<(), BudgetError> {
        let budget = GlobalTickBudget::new(duration)?;
        *self.global_budget.write().expect("poisoned") = budget;
        Ok(())
    }

    /// Reports that a tick's wall-clock duration exceeded the tick
    /// period. Increments the global overrun counter, records the tick
    /// number, and forwards to the metrics registry.
    pub fn report_tick_overrun(&self, tick_no: u64, duration_ns: u64) {
        self.overrun_count.fetch_add(1, Ordering::Relaxed);
        self.last_overrun_tick.store(tick_no, Ordering::Relaxed);
        *self.last_overrun_at.write().expect("poisoned") = Some(SystemTime::now());
        self.metrics.counter("tick.overruns").increment();
        self.metrics.record_overrun(tick_no, duration_ns);
    }

    /// Total tick overruns observed since this manager was created.
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count.load(Ordering::Relaxed)
    }

    /// The last tick number that overran, if any have yet.
    pub fn last_overrun_tick(&self) -> Option<u64> {
        if self.overrun_count() == 0 {
            None
        } else {
            Some(self.last_overrun_tick.load(Ordering::Relaxed))
        }
    }

    /// A diagnostic snapshot of a registered unit's accounting.
    pub fn unit_snapshot(&self, unit_id: &str) -> Option<UnitBudgetSnapshot> {
        let units = self.units.read().expect("poisoned");
        units.get(unit_id).map(|unit| UnitBudgetSnapshot {
            budget_ns: unit.budget_ns(),
            current_tick_ns: unit.current_tick_ns(),
            total_ns: unit.total_ns(),
            over_budget_count: unit.over_budget_count(),
        })
    }

    /// Nanoseconds charged this tick to units that were never
    /// explicitly registered.
    pub fn default_bucket_current_tick_ns(&self) -> u64 {
        self.default_bucket.current_tick_ns()
    }

    /// Cumulative nanoseconds ever charged to the default bucket.
    pub fn default_bucket_total_ns(&self) -> u64 {
        self.default_bucket.total_ns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> BudgetManager {
        BudgetManager::new(MetricsRegistry::new())
    }

    #[test]
    fn unregistered_unit_is_always_within_budget() {
        let mgr = manager();
        mgr.record_execution("ghost", 1_000_000_000);
        assert!(mgr.within_budget("ghost"));
    }

    #[test]
    fn registered_unit_goes_out_of_budget() {
        let mgr = manager();
        mgr.register("physics", Duration::from_millis(5));
        mgr.record_execution("physics", Duration::from_millis(6).as_nanos() as u64);
        assert!(!mgr.within_budget("physics"));
        let snap = mgr.unit_snapshot("physics").unwrap();
        assert_eq!(snap.over_budget_count, 1);
    }

    #[test]
    fn reset_tick_clears_current_but_keeps_totals() {
        let mgr = manager();
        mgr.register("ai", Duration::from_millis(10));
        mgr.record_execution("ai", 2_000_000);
        mgr.reset_tick();
        let snap = mgr.unit_snapshot("ai").unwrap();
        assert_eq!(snap.current_tick_ns, 0);
        assert_eq!(snap.total_ns, 2_000_000);
    }

    #[test]
    fn report_tick_overrun_tracks_count_and_last_tick() {
        let mgr = manager();
        assert_eq!(mgr.last_overrun_tick(), None);
        mgr.report_tick_overrun(42, 60_000_000);
        assert_eq!(mgr.overrun_count(), 1);
        assert_eq!(mgr.last_overrun_tick(), Some(42));
    }

    #[test]
    fn set_global_budget_rejects_out_of_range() {
        let mgr = manager();
        assert!(mgr.set_global_budget(Duration::from_millis(200)).is_err());
        // Unaffected: still the default.
        assert_eq!(mgr.global_budget().duration(), Duration::from_millis(45));
    }
}
