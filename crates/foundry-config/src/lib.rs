//! Typed configuration store for the Foundry runtime core.
//!
//! Configs are plain structs that implement [`TypedConfig`], registered
//! with a [`ConfigStore`] under a string id. Each registered config is
//! backed by a `.properties` file under the store's config directory;
//! once [`ConfigStore::initialize`] starts the background watcher,
//! edits to that file are picked up automatically and re-validated
//! before they replace the live value.

mod error;
mod holder;
mod properties;
mod store;
mod typed;
mod watcher;

pub use error::ConfigError;
pub use properties::PropertiesMap;
pub use store::ConfigStore;
pub use typed::TypedConfig;
