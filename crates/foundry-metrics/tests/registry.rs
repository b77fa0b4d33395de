//! Integration tests exercising the registry as an external consumer
//! would: through its public API only.

use foundry_metrics::MetricsRegistry;

#[test]
fn histogram_and_timer_are_independent_from_counters() {
    let registry = MetricsRegistry::new();

    registry.counter("requests.total").add(3);
    registry.gauge("connections.active").set(7.0);
    registry.histogram("latency.ms").record(12.5);
    registry.timer("task.exec").record(42_000);

    assert_eq!(registry.counter("requests.total").value(), 3);
    assert_eq!(registry.gauge("connections.active").value(), 7.0);
    assert_eq!(registry.histogram("latency.ms").stats().count, 1);
    assert_eq!(registry.timer("task.exec").stats().count, 1);
}

#[test]
fn tick_stats_report_p99_over_full_ring() {
    let registry = MetricsRegistry::new();
    for i in 1..=foundry_metrics::TICK_RING_SIZE {
        registry.record_tick_duration(i as u64 * 1_000);
    }
    let stats = registry.get_tick_stats();
    assert_eq!(stats.total_ticks, foundry_metrics::TICK_RING_SIZE as u64);
    assert_eq!(stats.max_ns, foundry_metrics::TICK_RING_SIZE as u64 * 1_000);
    assert!(stats.p99_ns <= stats.max_ns);
    assert!(stats.p99_ns >= stats.mean_ns as u64);
}

#[test]
fn overrun_log_caps_at_100_entries() {
    let registry = MetricsRegistry::new();
    for tick in 0..150u64 {
        registry.record_overrun(tick, 60_000_000);
    }
    let records = registry.overrun_records();
    assert_eq!(records.len(), foundry_metrics::OVERRUN_LOG_SIZE);
    assert_eq!(records.last().unwrap().tick, 149);
}
