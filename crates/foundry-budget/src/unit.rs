//! Per-unit budget accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Nanosecond accounting for one registered unit.
///
/// `current_tick_ns` resets to zero at the start of every tick;
/// `total_ns` and `over_budget_count` are cumulative for the process
/// lifetime.
pub(crate) struct UnitBudget {
    budget_ns: u64,
    current_tick_ns: AtomicU64,
    total_ns: AtomicU64,
    over_budget_count: AtomicU64,
}

impl UnitBudget {
    pub(crate) fn new(budget_ns: u64) -> Self {
        Self {
            budget_ns,
            current_tick_ns: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
            over_budget_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn reset_tick(&self) {
        self.current_tick_ns.store(0, Ordering::Relaxed);
    }

    /// Adds `ns` to both the current-tick and total counters. Returns
    /// `true` if this recording pushed the current-tick counter over
    /// budget (crossed the line, not merely at-or-above before).
    pub(crate) fn record(&self, ns: u64) -> bool {
        let before = self.current_tick_ns.fetch_add(ns, Ordering::Relaxed);
        self.total_ns.fetch_add(ns, Ordering::Relaxed);
        let after = before + ns;
        if after > self.budget_ns {
            self.over_budget_count.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        false
    }

    pub(crate) fn remaining_ns(&self) -> u64 {
        self.budget_ns
            .saturating_sub(self.current_tick_ns.load(Ordering::Relaxed))
    }

    pub(crate) fn within_budget(&self) -> bool {
        self.current_tick_ns.load(Ordering::Relaxed) < self.budget_ns
    }

    pub(crate) fn current_tick_ns(&self) -> u64 {
        self.current_tick_ns.load(Ordering::Relaxed)
    }

    pub(crate) fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed)
    }

    pub(crate) fn over_budget_count(&self) -> u64 {
        self.over_budget_count.load(Ordering::Relaxed)
    }

    pub(crate) fn budget_ns(&self) -> u64 {
        self.budget_ns
    }
}

/// The default bucket unregistered units charge to. Tracks usage for
/// observability but never reports "over budget" — only explicit
/// registration opts a unit into enforcement.
pub(crate) struct DefaultBucket {
    current_tick_ns: AtomicU64,
    total_ns: AtomicU64,
}

impl DefaultBucket {
    pub(crate) fn new() -> Self {
        Self {
            current_tick_ns: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
        }
    }

    pub(crate) fn reset_tick(&self) {
        self.current_tick_ns.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, ns: u64) {
        self.current_tick_ns.fetch_add(ns, Ordering::Relaxed);
        self.total_ns.fetch_add(ns, Ordering::Relaxed);
    }

    pub(crate) fn current_tick_ns(&self) -> u64 {
        self.current_tick_ns.load(Ordering::Relaxed)
    }

    pub(crate) fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Relaxed)
    }
}
