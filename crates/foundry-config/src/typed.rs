//! The [`TypedConfig`] trait implemented by every concrete config type
//! registered with a [`crate::ConfigStore`].

use crate::error::ConfigError;
use crate::properties::PropertiesMap;

/// A strongly-typed configuration value that knows how to load itself
/// from, and serialize itself back to, a [`PropertiesMap`].
///
/// Implementors are typically small plain structs with primitive
/// fields. `load`/`save` round-trip through `PropertiesMap` rather than
/// through `serde`, so the registry doesn't need to be generic over a
/// serialization format at the type-erasure boundary.
pub trait TypedConfig: Default + Clone + Send + Sync + 'static {
    /// Populates `self` from parsed key=value pairs. Unknown keys are
    /// ignored; missing keys keep the field's `Default` value.
    fn load(&mut self, kv: &PropertiesMap) -> Result<(), ConfigError>;

    /// Writes `self` into `kv` as key=value pairs.
    fn save(&self, kv: &mut PropertiesMap);

    /// Returns a list of human-readable validation failures. An empty
    /// list means the current value is acceptable.
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    /// The current on-disk schema version this type writes. Bump this
    /// when a field is renamed or reinterpreted in a way `migrate`
    /// needs to handle.
    fn schema_version() -> u32 {
        1
    }

    /// Upgrades `kv` written under `from_version` to a form this type's
    /// `load` can consume at the current `schema_version`. The default
    /// passthrough is correct for types that have never changed shape.
    fn migrate(from_version: u32, kv: PropertiesMap) -> Result<PropertiesMap, ConfigError> {
        let _ = from_version;
        Ok(kv)
    }
}
