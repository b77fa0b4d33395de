//! `UnitScope`: an isolated code-loading scope for one unit's shared
//! library, dropped on unload.

use libloading::Library;

use crate::descriptor::UnitDescriptor;
use crate::error::PluginError;
use crate::unit::{Unit, UnitConstructor};

/// Owns a loaded unit's shared library and the instance constructed
/// from it.
///
/// Field order matters: `instance` must drop before `library`, since
/// the instance's vtable and any code it calls back into lives inside
/// the library's mapped memory. Dropping `UnitScope` releases both and
/// unmaps the library.
pub struct UnitScope {
    instance: Option<Box<dyn Unit>>,
    _library: Option<Library>,
}

impl UnitScope {
    /// Loads `descriptor.library_path`, resolves the constructor symbol
    /// named by `descriptor.entry_point`, and constructs the unit
    /// instance.
    pub fn load(descriptor: &UnitDescriptor) -> Result<Self, PluginError> {
        // SAFETY: see the caveat on `UnitConstructor` -- loading a unit
        // built against an incompatible compiler/crate version is UB,
        // which we accept as this crate's deployment contract.
        let library = unsafe { Library::new(&descriptor.library_path) }.map_err(|source| PluginError::Library {
            path: descriptor.library_path.clone(),
            source,
        })?;

        let instance = unsafe {
            let constructor: libloading::Symbol<UnitConstructor> = library
                .get(descriptor.entry_point.as_bytes())
                .map_err(|source| PluginError::Library {
                    path: descriptor.library_path.clone(),
                    source,
                })?;
            let raw = constructor();
            if raw.is_null() {
                return Err(PluginError::Load {
                    unit_id: descriptor.id.clone(),
                    message: "entry point returned a null instance".to_string(),
                });
            }
            Box::from_raw(raw)
        };

        Ok(Self { instance: Some(instance), _library: Some(library) })
    }

    /// Wraps an already-constructed instance with no backing library.
    /// Used by manager tests that exercise the state machine directly
    /// rather than dlopening a real fixture `.so`.
    #[cfg(test)]
    pub(crate) fn from_instance(instance: Box<dyn Unit>) -> Self {
        Self { instance: Some(instance), _library: None }
    }

    pub fn instance(&self) -> &dyn Unit {
        self.instance.as_deref().expect("scope instance only taken on drop")
    }

    pub fn instance_mut(&mut self) -> &mut dyn Unit {
        self.instance.as_deref_mut().expect("scope instance only taken on drop")
    }
}
