//! Error types for the tick scheduler.

/// Errors surfaced by tick scheduler construction and shutdown.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// Failed to spawn the dedicated tick-loop thread.
    #[error("failed to spawn tick loop thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// `shutdown` was called, or timed out, waiting for the tick loop
    /// thread to join.
    #[error("tick loop thread did not shut down cleanly")]
    ShutdownJoin,
}
