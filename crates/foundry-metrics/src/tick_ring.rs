//! Fixed-size ring buffer of recent tick durations.

use crate::TICK_RING_SIZE;

/// Statistics computed over the valid prefix of the tick ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStats {
    pub mean_ns: f64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub p99_ns: u64,
    pub total_ticks: u64,
}

impl TickStats {
    fn empty(total_ticks: u64) -> Self {
        Self {
            mean_ns: 0.0,
            min_ns: 0,
            max_ns: 0,
            p99_ns: 0,
            total_ticks,
        }
    }
}

/// Circular buffer of the most recent [`TICK_RING_SIZE`] tick durations.
///
/// `total_ticks` counts every tick ever recorded, even past the ring's
/// capacity — it's the denominator in "after M >= N recorded ticks,
/// `total_ticks == M`".
pub(crate) struct TickRing {
    durations_ns: Box<[u64; TICK_RING_SIZE]>,
    total_ticks: u64,
}

impl TickRing {
    pub(crate) fn new() -> Self {
        Self {
            durations_ns: Box::new([0; TICK_RING_SIZE]),
            total_ticks: 0,
        }
    }

    /// Writes `ns` into the ring at `total_ticks mod N` and advances the
    /// counter. Returns `total_ticks` after this recording, so callers
    /// can decide whether this was e.g. the 20th recorded tick.
    pub(crate) fn record(&mut self, ns: u64) -> u64 {
        let idx = (self.total_ticks as usize) % TICK_RING_SIZE;
        self.durations_ns[idx] = ns;
        self.total_ticks += 1;
        self.total_ticks
    }

    pub(crate) fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Computes stats over the valid prefix: `min(total_ticks, N)`
    /// entries. Simplicity over speed — the whole prefix is sorted to
    /// get p99, which is fine at 1,200 samples.
    pub(crate) fn stats(&self) -> TickStats {
        let valid = self.total_ticks.min(TICK_RING_SIZE as u64) as usize;
        if valid == 0 {
            return TickStats::empty(self.total_ticks);
        }

        let mut sorted: Vec<u64> = self.durations_ns[..valid].to_vec();
        sorted.sort_unstable();

        let sum: u128 = sorted.iter().map(|&d| d as u128).sum();
        let mean_ns = sum as f64 / valid as f64;
        let min_ns = sorted[0];
        let max_ns = sorted[valid - 1];

        // p99 index: ceil(0.99 * valid) - 1, clamped into range.
        let p99_idx = ((valid as f64 * 0.99).ceil() as usize)
            .saturating_sub(1)
            .min(valid - 1);
        let p99_ns = sorted[p99_idx];

        TickStats {
            mean_ns,
            min_ns,
            max_ns,
            p99_ns,
            total_ticks: self.total_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_over_partial_ring_uses_only_recorded_entries() {
        let mut ring = TickRing::new();
        ring.record(10);
        ring.record(20);
        ring.record(30);
        let stats = ring.stats();
        assert_eq!(stats.total_ticks, 3);
        assert_eq!(stats.min_ns, 10);
        assert_eq!(stats.max_ns, 30);
        assert_eq!(stats.mean_ns, 20.0);
    }

    #[test]
    fn ring_wraps_and_total_exceeds_capacity() {
        let mut ring = TickRing::new();
        for i in 0..(TICK_RING_SIZE as u64 + 5) {
            ring.record(i);
        }
        let stats = ring.stats();
        assert_eq!(stats.total_ticks, TICK_RING_SIZE as u64 + 5);
        // Oldest 5 entries (0..5) were overwritten by the wrap.
        assert_eq!(stats.min_ns, 5);
    }

    #[test]
    fn empty_ring_reports_zeroed_stats() {
        let ring = TickRing::new();
        let stats = ring.stats();
        assert_eq!(stats.total_ticks, 0);
        assert_eq!(stats.mean_ns, 0.0);
    }
}
