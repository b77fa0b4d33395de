//! Error taxonomy for the plug-in manager.

/// Errors surfaced by unit discovery, loading, and lifecycle transitions.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The modules directory couldn't be read.
    #[error("failed to read modules directory {path}: {source}")]
    Discovery {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A package's manifest couldn't be parsed. Discovery logs this and
    /// skips the offending package; it's only returned directly from
    /// [`crate::manager::PluginManager::load`] when loading a single
    /// descriptor by hand.
    #[error("manifest parse error in {path}: {message}")]
    ManifestParse { path: std::path::PathBuf, message: String },

    /// A hard dependency of `unit_id` is missing from the discovered
    /// set, or the dependency graph contains a cycle through `unit_id`.
    #[error("dependency error for unit {unit_id}: {message}")]
    Dependency { unit_id: String, message: String },

    /// Symbol resolution, instantiation, or `on_load` failed.
    #[error("failed to load unit {unit_id}: {message}")]
    Load { unit_id: String, message: String },

    /// `on_enable` raised an error; the unit transitions to `Failed`.
    #[error("failed to enable unit {unit_id}: {message}")]
    Enable { unit_id: String, message: String },

    /// The requested unit id has no container.
    #[error("no unit loaded with id {0}")]
    NotLoaded(String),

    /// `load` was called with a descriptor whose id already has a
    /// container installed.
    #[error("unit {0} is already loaded")]
    AlreadyLoaded(String),

    /// The unit exists but is not in a state that allows the requested
    /// transition.
    #[error("unit {unit_id} is {state}, which cannot transition to {target}")]
    IllegalTransition { unit_id: String, state: String, target: String },

    /// `reload(id)` was called on a unit that doesn't advertise reload
    /// support.
    #[error("unit {0} does not support reload")]
    ReloadUnsupported(String),

    /// Dynamic library loading failed.
    #[error("failed to load unit library {path}: {source}")]
    Library {
        path: std::path::PathBuf,
        #[source]
        source: libloading::Error,
    },
}
