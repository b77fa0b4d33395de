//! Error types for the config store.

/// Errors surfaced by config store operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the backing file failed.
    #[error("config I/O error for {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// The on-disk content couldn't be parsed as `key=value` lines.
    #[error("config parse error for {id}: {message}")]
    Parse { id: String, message: String },

    /// The typed config rejected its content via `validate()`.
    #[error("config {id} failed validation: {}", .messages.join("; "))]
    Validation { id: String, messages: Vec<String> },

    /// `migrate()` could not bring old content up to the current schema.
    #[error("config {id} migration from schema {from_version} failed: {message}")]
    Migration {
        id: String,
        from_version: u32,
        message: String,
    },

    /// No config is registered under this id.
    #[error("no config registered for id {0}")]
    UnregisteredId(String),

    /// `get`/`reload` was called with a type that doesn't match the
    /// type originally registered under this id.
    #[error("config {id} is registered as {registered_type}, not the requested type")]
    TypeMismatch { id: String, registered_type: &'static str },
}
