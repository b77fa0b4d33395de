//! The metrics registry itself: lookup-or-create factories plus tick
//! instrumentation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::exporter::{MetricsExporter, MetricsSnapshot};
use crate::handles::{Counter, Gauge, Histogram, Timer};
use crate::memory;
use crate::overrun::OverrunLog;
use crate::tick_ring::{TickRing, TickStats};
use crate::{MEMORY_SAMPLE_INTERVAL, OverrunRecord};

struct Inner {
    counters: RwLock<HashMap<String, Counter>>,
    gauges: RwLock<HashMap<String, Gauge>>,
    histograms: RwLock<HashMap<String, Histogram>>,
    timers: RwLock<HashMap<String, Timer>>,
    tick_ring: Mutex<TickRing>,
    overruns: Mutex<OverrunLog>,
    exporters: Mutex<Vec<Box<dyn MetricsExporter>>>,
}

/// Named metric factory and tick instrumentation hub.
///
/// Cheap to clone (an `Arc` underneath) — every subsystem that needs to
/// record a metric holds its own clone rather than reaching through a
/// global.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

impl MetricsRegistry {
    /// Creates an empty registry with no exporters attached.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                counters: RwLock::new(HashMap::new()),
                gauges: RwLock::new(HashMap::new()),
                histograms: RwLock::new(HashMap::new()),
                timers: RwLock::new(HashMap::new()),
                tick_ring: Mutex::new(TickRing::new()),
                overruns: Mutex::new(OverrunLog::new()),
                exporters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the counter named `name`, creating it on first reference.
    pub fn counter(&self, name: &str) -> Counter {
        if let Some(c) = self.inner.counters.read().expect("poisoned").get(name) {
            return c.clone();
        }
        let mut counters = self.inner.counters.write().expect("poisoned");
        counters.entry(name.to_string()).or_insert_with(Counter::new).clone()
    }

    /// Returns the gauge named `name`, creating it on first reference.
    pub fn gauge(&self, name: &str) -> Gauge {
        if let Some(g) = self.inner.gauges.read().expect("poisoned").get(name) {
            return g.clone();
        }
        let mut gauges = self.inner.gauges.write().expect("poisoned");
        gauges.entry(name.to_string()).or_insert_with(Gauge::new).clone()
    }

    /// Returns the histogram named `name`, creating it on first reference.
    pub fn histogram(&self, name: &str) -> Histogram {
        if let Some(h) = self.inner.histograms.read().expect("poisoned").get(name) {
            return h.clone();
        }
        let mut histograms = self.inner.histograms.write().expect("poisoned");
        histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .clone()
    }

    /// Returns the timer named `name`, creating it on first reference.
    pub fn timer(&self, name: &str) -> Timer {
        if let Some(t) = self.inner.timers.read().expect("poisoned").get(name) {
            return t.clone();
        }
        let mut timers = self.inner.timers.write().expect("poisoned");
        timers.entry(name.to_string()).or_insert_with(Timer::new).clone()
    }

    /// Records one tick's wall-clock duration.
    ///
    /// Writes into the tick ring, feeds the `tick.duration` histogram
    /// (in milliseconds), and samples memory usage every
    /// [`MEMORY_SAMPLE_INTERVAL`]th recorded tick.
    pub fn record_tick_duration(&self, ns: u64) {
        let total = self
            .inner
            .tick_ring
            .lock()
            .expect("tick ring mutex poisoned")
            .record(ns);

        self.histogram("tick.duration").record(ns as f64 / 1_000_000.0);

        if total % MEMORY_SAMPLE_INTERVAL == 0 {
            let sample = memory::sample();
            self.gauge("memory.used_bytes").set(sample.used_bytes);
            self.gauge("memory.free_bytes").set(sample.free_bytes);
            self.gauge("memory.max_bytes").set(sample.max_bytes);
        }
    }

    /// Records a tick overrun: appends to the bounded overrun log.
    pub fn record_overrun(&self, tick: u64, duration_ns: u64) {
        self.inner
            .overruns
            .lock()
            .expect("overrun log mutex poisoned")
            .push(tick, duration_ns);
    }

    /// Returns the most recent overrun records (oldest first, capacity
    /// [`crate::OVERRUN_LOG_SIZE`]).
    pub fn overrun_records(&self) -> Vec<OverrunRecord> {
        self.inner.overruns.lock().expect("poisoned").records()
    }

    /// Computes tick statistics over the valid prefix of the ring.
    pub fn get_tick_stats(&self) -> TickStats {
        self.inner
            .tick_ring
            .lock()
            .expect("tick ring mutex poisoned")
            .stats()
    }

    /// Registers an exporter. Exporters are called in registration order
    /// by [`Self::export_to_all`].
    pub fn add_exporter(&self, exporter: Box<dyn MetricsExporter>) {
        self.inner.exporters.lock().expect("poisoned").push(exporter);
    }

    /// Snapshots every metric and hands the snapshot to each registered
    /// exporter in turn. An exporter that fails is logged; the rest
    /// still run.
    pub fn export_to_all(&self) {
        let snapshot = self.snapshot();
        let exporters = self.inner.exporters.lock().expect("poisoned");
        for exporter in exporters.iter() {
            if let Err(err) = exporter.export(&snapshot) {
                tracing::warn!(error = %err, "metrics exporter failed");
            }
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .inner
            .counters
            .read()
            .expect("poisoned")
            .iter()
            .map(|(name, c)| (name.clone(), c.value()))
            .collect();
        let gauges = self
            .inner
            .gauges
            .read()
            .expect("poisoned")
            .iter()
            .map(|(name, g)| (name.clone(), g.value()))
            .collect();
        let histograms = self
            .inner
            .histograms
            .read()
            .expect("poisoned")
            .iter()
            .map(|(name, h)| (name.clone(), h.stats()))
            .collect();
        let timers = self
            .inner
            .timers
            .read()
            .expect("poisoned")
            .iter()
            .map(|(name, t)| (name.clone(), t.stats()))
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            histograms,
            timers,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
