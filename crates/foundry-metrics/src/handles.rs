//! Metric handle types: `Counter`, `Gauge`, `Histogram`, `Timer`.
//!
//! Each handle is a cheap-to-clone wrapper around an `Arc` to shared
//! state. The registry hands out the same handle for the same name on
//! every call, so two callers that both ask for `counter("foo")` are
//! really incrementing the same underlying atomic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A monotonically non-decreasing 64-bit counter.
///
/// Reads are wait-free relative to writes: both are single atomic
/// operations with `Relaxed` ordering, since counters have no
/// cross-field invariant to preserve.
#[derive(Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub(crate) fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Increments the counter by 1.
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `delta` to the counter. `delta` must be non-negative —
    /// counters never decrease.
    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Returns the current total.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge holding the most recently set value.
///
/// Stored as the bit pattern of an `f64` inside an `AtomicU64` so reads
/// and writes stay lock-free without needing a mutex for a single
/// scalar.
#[derive(Clone)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Gauge {
    pub(crate) fn new() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(0.0f64.to_bits())),
        }
    }

    /// Sets the gauge to `value`.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Returns the last value set.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Internal joint state for a histogram: count, sum, min, max must all
/// move together or `mean`/`min`/`max` could observe a torn update.
struct HistogramState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl HistogramState {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn stats(&self) -> HistogramStats {
        HistogramStats {
            count: self.count,
            mean: if self.count == 0 {
                0.0
            } else {
                self.sum / self.count as f64
            },
            min: if self.count == 0 { 0.0 } else { self.min },
            max: if self.count == 0 { 0.0 } else { self.max },
        }
    }
}

/// A snapshot of a histogram's accumulated statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramStats {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Records a stream of doubles and reports count/mean/min/max.
///
/// Guarded by a plain mutex rather than atomics: concurrent record/read
/// may briefly observe an inconsistent snapshot (the spec explicitly
/// doesn't require serialization here), but updates to count/sum/min/max
/// must happen together or `mean` could be computed against a `sum`
/// that doesn't match `count`.
#[derive(Clone)]
pub struct Histogram {
    state: Arc<Mutex<HistogramState>>,
}

impl Histogram {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HistogramState::new())),
        }
    }

    /// Records one observation.
    pub fn record(&self, value: f64) {
        let mut state = self.state.lock().expect("histogram mutex poisoned");
        state.record(value);
    }

    /// Returns the current statistics.
    pub fn stats(&self) -> HistogramStats {
        self.state.lock().expect("histogram mutex poisoned").stats()
    }
}

/// A snapshot of a timer's accumulated statistics, all in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStats {
    pub count: u64,
    pub mean_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
}

struct TimerState {
    count: u64,
    total_ns: u128,
    min_ns: u64,
    max_ns: u64,
}

impl TimerState {
    fn new() -> Self {
        Self {
            count: 0,
            total_ns: 0,
            min_ns: u64::MAX,
            max_ns: 0,
        }
    }

    fn record(&mut self, ns: u64) {
        self.count += 1;
        self.total_ns += ns as u128;
        if ns < self.min_ns {
            self.min_ns = ns;
        }
        if ns > self.max_ns {
            self.max_ns = ns;
        }
    }

    fn stats(&self) -> TimerStats {
        TimerStats {
            count: self.count,
            mean_ns: if self.count == 0 {
                0
            } else {
                (self.total_ns / self.count as u128) as u64
            },
            min_ns: if self.count == 0 { 0 } else { self.min_ns },
            max_ns: self.max_ns,
        }
    }
}

/// Records a stream of nanosecond durations.
#[derive(Clone)]
pub struct Timer {
    state: Arc<Mutex<TimerState>>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
        }
    }

    /// Records one duration, in nanoseconds.
    pub fn record(&self, ns: u64) {
        let mut state = self.state.lock().expect("timer mutex poisoned");
        state.record(ns);
    }

    /// Returns the current statistics.
    pub fn stats(&self) -> TimerStats {
        self.state.lock().expect("timer mutex poisoned").stats()
    }
}
