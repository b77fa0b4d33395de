//! Lifecycle orchestrator for the Foundry tick-driven plug-in runtime
//! core.
//!
//! [`Runtime`] ties together the four subsystems that actually do the
//! work -- [`foundry_metrics`], [`foundry_budget`], [`foundry_config`],
//! [`foundry_tick`] -- and the plug-in manager ([`foundry_plugin`]) that
//! discovers, loads, enables, reloads, and unloads binary units on top
//! of them. An embedder constructs one `Runtime`, retains it for the
//! process's lifetime, and calls [`Runtime::start`] /
//! [`Runtime::stop`] / [`Runtime::reload`] around it; nothing in this
//! crate reaches for ambient global state.
//!
//! ```text
//! start(): C1 (metrics) -> C2 (budget) -> C3 (config) -> C4 (scheduler)
//!          -> C5 discover + resolve + load + enable, in dependency order
//! stop():  unload all units (reverse load order) -> C4 -> C3 -> C2 -> C1
//! ```

mod error;
mod logging;
mod runtime;

pub use error::ForgeError;
pub use logging::init_logging;
pub use runtime::{Runtime, RuntimeState};

pub use foundry_budget::{BudgetManager, GlobalTickBudget};
pub use foundry_config::{ConfigStore, TypedConfig};
pub use foundry_metrics::MetricsRegistry;
pub use foundry_plugin::{PluginError, PluginManager, Unit, UnitContext, UnitDescriptor, UnitState};
pub use foundry_tick::{Priority, TaskHandle, TickScheduler};
