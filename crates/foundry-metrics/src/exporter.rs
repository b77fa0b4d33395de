//! Metric exporters: snapshot the registry and hand it to a sink.

use crate::handles::{HistogramStats, TimerStats};

/// A point-in-time snapshot of every metric currently registered.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub counters: Vec<(String, u64)>,
    pub gauges: Vec<(String, f64)>,
    pub histograms: Vec<(String, HistogramStats)>,
    pub timers: Vec<(String, TimerStats)>,
}

/// A sink that receives metric snapshots.
///
/// `export_to_all` calls every registered exporter in turn; an exporter
/// that fails is logged and does not stop the others — one flaky sink
/// shouldn't blind every other consumer.
pub trait MetricsExporter: Send + Sync {
    /// Exports one snapshot. Errors are logged by the caller, not
    /// propagated to other exporters.
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<(), ExportError>;
}

/// An exporter failure. Opaque on purpose — exporters carry whatever
/// context they need into the message.
#[derive(Debug, thiserror::Error)]
#[error("metrics export failed: {0}")]
pub struct ExportError(pub String);

/// Built-in exporter that logs a one-line summary at `info` level.
///
/// The default choice when no dedicated metrics backend is wired up —
/// every teacher crate in this lineage reaches for `tracing` as the
/// fallback observability surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingExporter;

impl MetricsExporter for TracingExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<(), ExportError> {
        tracing::info!(
            counters = snapshot.counters.len(),
            gauges = snapshot.gauges.len(),
            histograms = snapshot.histograms.len(),
            timers = snapshot.timers.len(),
            "metrics snapshot exported"
        );
        Ok(())
    }
}
