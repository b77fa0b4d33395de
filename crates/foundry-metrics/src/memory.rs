//! Best-effort process memory sampling, used to feed the `memory.*` gauges.
//!
//! There's no portable stdlib way to read RSS/available memory, and
//! pulling in a full system-info crate for three gauges isn't worth it.
//! On Linux we parse `/proc/self/status`; elsewhere the sample is zeroed
//! rather than failing — metrics recording is infallible by contract.

/// A single memory sample: used, free, and max bytes.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MemorySample {
    pub used_bytes: f64,
    pub free_bytes: f64,
    pub max_bytes: f64,
}

#[cfg(target_os = "linux")]
pub(crate) fn sample() -> MemorySample {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return MemorySample::default();
    };
    let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") else {
        return MemorySample::default();
    };

    let vm_rss_kb = parse_kb_field(&status, "VmRSS:").unwrap_or(0);
    let mem_available_kb = parse_kb_field(&meminfo, "MemAvailable:").unwrap_or(0);
    let mem_total_kb = parse_kb_field(&meminfo, "MemTotal:").unwrap_or(0);

    MemorySample {
        used_bytes: (vm_rss_kb * 1024) as f64,
        free_bytes: (mem_available_kb * 1024) as f64,
        max_bytes: (mem_total_kb * 1024) as f64,
    }
}

#[cfg(target_os = "linux")]
fn parse_kb_field(text: &str, field: &str) -> Option<u64> {
    text.lines()
        .find(|line| line.starts_with(field))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn sample() -> MemorySample {
    MemorySample::default()
}
