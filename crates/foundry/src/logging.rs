//! Ambient logging setup: a daily rolling file under `logs/` plus a
//! stdout layer, both driven by `tracing-subscriber`'s env filter.
//!
//! The logging *sink* itself (the log-file format, rotation policy
//! mechanics) is an external collaborator per spec §1 -- this module
//! only wires the `tracing` ecosystem crates the teacher already
//! depends on into the shape spec §6 names: one file per day under the
//! runtime's data directory.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber that writes to both stdout
/// and a daily-rotating file under `{data_dir}/logs/`.
///
/// Returns a [`WorkerGuard`] the caller must keep alive for the
/// process's lifetime -- dropping it flushes and stops the background
/// writer thread that drains the log queue (spec §5: "one background
/// thread drains the log queue").
///
/// Not idempotent: calling this twice in one process panics, since
/// `tracing` only allows one global default subscriber. Callers embed
/// `foundry` in a binary and call this once at startup.
pub fn init_logging(data_dir: &Path, product: &str) -> std::io::Result<WorkerGuard> {
    let logs_dir = data_dir.join("logs");
    std::fs::create_dir_all(&logs_dir)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(product.to_string())
        .filename_suffix("log")
        .build(&logs_dir)
        .expect("daily rolling file appender builder is infallible for a valid directory");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false);
    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}
