//! Metrics registry for the Foundry runtime core.
//!
//! Provides four kinds of metric handles — counters, gauges, histograms,
//! and timers — all keyed by name and created on first reference
//! (lookup-or-create). Also owns the rolling tick-duration ring and the
//! bounded overrun log that the tick scheduler feeds every tick.
//!
//! # Architecture
//!
//! ```text
//! Tick scheduler ──record_tick_duration()──▶ MetricsRegistry ──export_to_all()──▶ exporters
//!       │                                          ▲
//!       └──────────────────counter/gauge/...───────┘
//! ```
//!
//! All recording paths are infallible — there's no I/O on the hot path.
//! Counters and gauges are plain atomics (wait-free reads relative to
//! writes); histograms and timers hold a small mutex because min/max/sum
//! need to update together.

mod exporter;
mod handles;
mod memory;
mod overrun;
mod registry;
mod tick_ring;

pub use exporter::{MetricsExporter, MetricsSnapshot, TracingExporter};
pub use handles::{Counter, Gauge, Histogram, HistogramStats, Timer, TimerStats};
pub use overrun::OverrunRecord;
pub use registry::MetricsRegistry;
pub use tick_ring::TickStats;

/// Bounded size of the tick-duration ring: one minute of history at 20 Hz.
pub const TICK_RING_SIZE: usize = 1200;

/// Bounded size of the overrun log.
pub const OVERRUN_LOG_SIZE: usize = 100;

/// Every Nth recorded tick triggers a memory-usage sample.
pub const MEMORY_SAMPLE_INTERVAL: u64 = 20;
