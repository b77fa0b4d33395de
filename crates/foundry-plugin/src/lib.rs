//! Plug-in discovery, dependency resolution, and lifecycle management
//! for the Foundry runtime core.
//!
//! A unit is a dynamically loaded shared library implementing [`Unit`],
//! described by a [`UnitDescriptor`] parsed from its package manifest.
//! [`PluginManager`] discovers manifests under a modules directory,
//! resolves them into a dependency-respecting load order (three-color
//! DFS over hard-dependency edges; see [`resolve`]), and drives every
//! unit through the ten-state lifecycle in [`UnitState`].
//!
//! ```text
//! Discovered → Loading → {Loaded, Failed}
//! Loaded → Enabling → {Enabled, Failed}
//! Enabled → Disabling → Disabled
//! Disabled → Enabling → Enabled        (re-enable)
//! {Loaded, Disabled} → Unloading → Unloaded
//! ```

mod context;
mod descriptor;
mod error;
mod manager;
pub mod resolve;
mod scope;
mod state;
mod unit;

pub use context::UnitContext;
pub use descriptor::UnitDescriptor;
pub use error::PluginError;
pub use manager::{DiscoverReport, PluginManager};
pub use scope::UnitScope;
pub use state::UnitState;
pub use unit::{Unit, UnitConstructor};
