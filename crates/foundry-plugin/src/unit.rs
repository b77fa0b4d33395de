//! The plug-in contract every unit's entry point must implement.

use std::any::Any;

use crate::context::UnitContext;

/// The contract a unit's entry point implements.
///
/// The manager calls these hooks at the matching lifecycle transition;
/// see [`crate::state::UnitState`] for the full state machine. All
/// hooks run on whichever thread initiated the transition (the
/// lifecycle orchestrator during start/stop, or a tick/async task
/// otherwise) -- never on a dedicated unit thread.
pub trait Unit: Send + Sync {
    /// Called once, immediately after construction, with this unit's
    /// capability bundle. A returned error aborts the load: the
    /// container is never installed.
    fn on_load(&mut self, ctx: &UnitContext) -> Result<(), String>;

    /// Called when the unit transitions from `Loaded`/`Disabled` to
    /// `Enabled`. A returned error leaves the unit in `Failed`.
    fn on_enable(&mut self) -> Result<(), String>;

    /// Called when the unit transitions from `Enabled` to `Disabled`.
    /// Errors are logged but never block the transition -- disable is
    /// best-effort cleanup.
    fn on_disable(&mut self);

    /// Whether this unit supports [`Unit::on_reload`]. The manager
    /// refuses `reload(id)` for units that return `false` (the
    /// default).
    fn supports_reload(&self) -> bool {
        false
    }

    /// Re-applies configuration without a full disable/enable cycle.
    /// Only called when [`Unit::supports_reload`] returns `true`.
    fn on_reload(&mut self) -> Result<(), String> {
        Err("unit does not support reload".to_string())
    }

    /// Type-erased downcasting hook for
    /// [`PluginManager::get_as`](crate::manager::PluginManager::get_as),
    /// the Rust-native stand-in for the source spec's `get(id,
    /// type_token)`. Implementors should return `self`:
    ///
    /// ```ignore
    /// fn as_any(&self) -> &dyn std::any::Any { self }
    /// ```
    fn as_any(&self) -> &dyn Any;
}

/// The symbol every unit's shared library exports: a zero-argument
/// constructor returning a freshly boxed, type-erased `Unit`.
///
/// # Safety
///
/// Fat pointers (`*mut dyn Unit` carries a vtable pointer alongside the
/// data pointer) are not part of Rust's stable ABI. This works because
/// host and unit are built with the same compiler and the same
/// `foundry-plugin` version; a unit built against a different compiler
/// or crate version is undefined behavior to load.
pub type UnitConstructor = unsafe extern "C" fn() -> *mut dyn Unit;
