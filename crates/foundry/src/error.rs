//! Unified error type for the Foundry runtime core.

use foundry_budget::BudgetError;
use foundry_config::ConfigError;
use foundry_plugin::PluginError;
use foundry_tick::TickError;

/// Top-level error that wraps every sub-crate's error type.
///
/// When using the `foundry` meta-crate, callers deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls, so
/// the `?` operator converts sub-crate errors automatically -- the same
/// pattern the teacher meta-crate uses to aggregate its sub-crate
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Filesystem setup under the data directory failed.
    #[error("runtime data directory I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config-store error (I/O, parse, validation, migration).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A budget-manager error (only global budget validation, today).
    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// A tick-scheduler error (thread spawn or shutdown join failure).
    #[error(transparent)]
    Tick(#[from] TickError),

    /// A plug-in-manager error (discovery, dependency, load, lifecycle).
    #[error(transparent)]
    Plugin(#[from] PluginError),
}
