//! The per-unit capability bundle handed to a unit once, at load time.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use foundry_config::ConfigStore;
use foundry_metrics::MetricsRegistry;
use foundry_tick::TickScheduler;

use crate::manager::PluginManager;

/// Capabilities a unit receives at load time. The bundle's lifetime
/// equals its container's -- it's constructed once in
/// [`PluginManager::load`](crate::manager::PluginManager::load) and
/// handed to the unit's `on_load`.
///
/// The manager reference is a [`Weak`] handle: a unit may look up
/// another unit through it, but must never cache the strong reference
/// it gets back -- look it up again each time, through
/// [`PluginManager::with_unit`](crate::manager::PluginManager::with_unit)
/// or [`PluginManager::get_as`](crate::manager::PluginManager::get_as).
#[derive(Clone)]
pub struct UnitContext {
    pub unit_id: String,
    pub data_dir: PathBuf,
    pub logger: tracing::Span,
    pub config: Arc<ConfigStore>,
    pub scheduler: Arc<TickScheduler>,
    pub metrics: MetricsRegistry,
    pub manager: Weak<PluginManager>,
}
