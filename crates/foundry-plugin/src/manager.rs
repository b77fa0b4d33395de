//! [`PluginManager`]: discovery, dependency resolution, and lifecycle
//! transitions for every loaded unit.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, Weak};

use foundry_config::ConfigStore;
use foundry_metrics::MetricsRegistry;
use foundry_tick::TickScheduler;

use crate::context::UnitContext;
use crate::descriptor::UnitDescriptor;
use crate::error::PluginError;
use crate::resolve::{self, Resolution};
use crate::scope::UnitScope;
use crate::state::UnitState;

/// One manager-owned record binding a descriptor to its live instance
/// and current state. Never shared with other units.
struct Container {
    descriptor: UnitDescriptor,
    scope: UnitScope,
    state: UnitState,
}

/// The outcome of [`PluginManager::discover_and_load`]: everything that
/// was discovered, excluded by dependency resolution, or failed at
/// parse/load time, so the lifecycle orchestrator can log a complete
/// picture and decide which ids to [`PluginManager::enable`].
#[derive(Debug, Default)]
pub struct DiscoverReport {
    /// Unit ids installed as `Loaded`, in load order.
    pub loaded: Vec<String>,
    /// `(unit_id, reason)` for descriptors dependency resolution excluded.
    pub excluded: Vec<(String, String)>,
    /// `(unit_id, message)` for descriptors that resolved into the load
    /// order but failed during `load` itself.
    pub failed_to_load: Vec<(String, String)>,
    /// `(manifest_path, message)` for packages whose manifest couldn't
    /// be parsed at all.
    pub parse_failures: Vec<(PathBuf, String)>,
}

/// Discovers, loads, enables, reloads, and unloads binary plug-in units
/// under a dependency-resolved order.
///
/// A single `RwLock` guards the container table; loads/enables/
/// disables/unloads acquire it for the entire transition (including
/// the call into user code), which is sound here because unit hooks
/// are synchronous and transitions are always initiated off the tick
/// thread -- see spec §4.5's concurrency note. Queries and `list` only
/// need a read lock.
pub struct PluginManager {
    modules_dir: PathBuf,
    containers: RwLock<HashMap<String, Container>>,
    load_order: RwLock<Vec<String>>,
    metrics: MetricsRegistry,
    config: Arc<ConfigStore>,
    scheduler: Arc<TickScheduler>,
    self_weak: Weak<PluginManager>,
}

impl PluginManager {
    /// Creates a manager rooted at `modules_dir`. Nothing is discovered
    /// or loaded until [`discover_and_load`](Self::discover_and_load) or
    /// [`load`](Self::load) is called.
    pub fn new(
        modules_dir: impl Into<PathBuf>,
        metrics: MetricsRegistry,
        config: Arc<ConfigStore>,
        scheduler: Arc<TickScheduler>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            modules_dir: modules_dir.into(),
            containers: RwLock::new(HashMap::new()),
            load_order: RwLock::new(Vec::new()),
            metrics,
            config,
            scheduler,
            self_weak: weak.clone(),
        })
    }

    /// Enumerates `modules_dir` for `*.unit.toml` manifests, parses each
    /// into a descriptor (logging and skipping parse failures), resolves
    /// the survivors into a topological load order, and loads each in
    /// turn. A single unit's load failure does not stop the rest.
    pub fn discover_and_load(&self) -> Result<DiscoverReport, PluginError> {
        let mut report = DiscoverReport::default();

        let entries = std::fs::read_dir(&self.modules_dir).map_err(|source| PluginError::Discovery {
            path: self.modules_dir.clone(),
            source,
        })?;

        let mut descriptors = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable directory entry during discovery");
                    continue;
                }
            };
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()).is_none_or(|n| !n.ends_with(".unit.toml")) {
                continue;
            }
            match UnitDescriptor::parse(&path) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unparseable unit manifest");
                    report.parse_failures.push((path, err.to_string()));
                }
            }
        }

        let Resolution { order, excluded } = resolve::resolve(descriptors);
        report.excluded = excluded;

        for descriptor in order {
            let id = descriptor.id.clone();
            match self.load(descriptor) {
                Ok(()) => report.loaded.push(id),
                Err(err) => {
                    tracing::error!(unit_id = %id, error = %err, "unit failed to load");
                    report.failed_to_load.push((id, err.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Loads a single descriptor: verifies its hard dependencies are
    /// already loaded, opens an isolated code-loading scope, invokes
    /// `on_load`, and installs the container in state `Loaded`. Any
    /// failure leaves no container behind and closes the scope.
    pub fn load(&self, descriptor: UnitDescriptor) -> Result<(), PluginError> {
        let id = descriptor.id.clone();

        {
            let containers = self.containers.read().expect("poisoned");
            if containers.contains_key(&id) {
                return Err(PluginError::AlreadyLoaded(id));
            }
            for dep in &descriptor.hard_dependencies {
                if !containers.contains_key(dep) {
                    return Err(PluginError::Dependency {
                        unit_id: id.clone(),
                        message: format!("hard dependency {dep} is not loaded"),
                    });
                }
            }
        }

        let data_dir = self.modules_dir.join(&id);
        std::fs::create_dir_all(&data_dir).map_err(|err| PluginError::Load {
            unit_id: id.clone(),
            message: format!("failed to create private data directory: {err}"),
        })?;

        let mut scope = UnitScope::load(&descriptor)?;

        let ctx = UnitContext {
            unit_id: id.clone(),
            data_dir,
            logger: tracing::info_span!("unit", unit_id = %id),
            config: self.config.clone(),
            scheduler: self.scheduler.clone(),
            metrics: self.metrics.clone(),
            manager: self.self_weak.clone(),
        };

        let load_result = std::panic::catch_unwind(AssertUnwindSafe(|| scope.instance_mut().on_load(&ctx)));
        match load_result {
            Ok(Ok(())) => {}
            Ok(Err(message)) => return Err(PluginError::Load { unit_id: id, message }),
            Err(_) => {
                return Err(PluginError::Load {
                    unit_id: id,
                    message: "on_load panicked".to_string(),
                });
            }
        }

        self.containers.write().expect("poisoned").insert(
            id.clone(),
            Container { descriptor, scope, state: UnitState::Loaded },
        );
        self.load_order.write().expect("poisoned").push(id);
        Ok(())
    }

    /// Enables a `Loaded` or `Disabled` unit. Does not verify that this
    /// unit's own hard dependencies are currently `Enabled` -- only that
    /// they were `Loaded` (enforced at load time); a dependent's
    /// `on_enable` is responsible for checking dependency state itself.
    pub fn enable(&self, id: &str) -> Result<(), PluginError> {
        let mut containers = self.containers.write().expect("poisoned");
        let container = containers.get_mut(id).ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        if !matches!(container.state, UnitState::Loaded | UnitState::Disabled) {
            return Err(PluginError::IllegalTransition {
                unit_id: id.to_string(),
                state: container.state.to_string(),
                target: UnitState::Enabling.to_string(),
            });
        }
        container.state = UnitState::Enabling;

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| container.scope.instance_mut().on_enable()));
        match result {
            Ok(Ok(())) => {
                container.state = UnitState::Enabled;
                Ok(())
            }
            Ok(Err(message)) => {
                container.state = UnitState::Failed;
                Err(PluginError::Enable { unit_id: id.to_string(), message })
            }
            Err(_) => {
                container.state = UnitState::Failed;
                Err(PluginError::Enable { unit_id: id.to_string(), message: "on_enable panicked".to_string() })
            }
        }
    }

    /// Disables an `Enabled` unit. `on_disable` errors (including
    /// panics) are logged but never block the transition -- disable is
    /// best-effort cleanup, so this always ends in `Disabled` once the
    /// unit was found `Enabled`.
    pub fn disable(&self, id: &str) -> Result<(), PluginError> {
        let mut containers = self.containers.write().expect("poisoned");
        let container = containers.get_mut(id).ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        if container.state != UnitState::Enabled {
            return Err(PluginError::IllegalTransition {
                unit_id: id.to_string(),
                state: container.state.to_string(),
                target: UnitState::Disabling.to_string(),
            });
        }
        container.state = UnitState::Disabling;
        Self::call_on_disable(id, container);
        container.state = UnitState::Disabled;
        Ok(())
    }

    /// Unloads a unit regardless of its current state (except already
    /// `Unloaded`, which has no container and so is simply absent).
    /// Disables first if still active, then drops the code-loading
    /// scope, releasing its library.
    pub fn unload(&self, id: &str) -> Result<(), PluginError> {
        let mut containers = self.containers.write().expect("poisoned");
        let mut container = containers.remove(id).ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        if matches!(container.state, UnitState::Enabled | UnitState::Disabling) {
            container.state = UnitState::Disabling;
            Self::call_on_disable(id, &mut container);
        }
        // container (and its UnitScope) drops here, releasing the library.
        self.load_order.write().expect("poisoned").retain(|loaded_id| loaded_id != id);
        Ok(())
    }

    /// Unloads every loaded unit in reverse load order. Individual
    /// failures are logged but do not stop the rest.
    pub fn unload_all(&self) {
        let order: Vec<String> = self.load_order.read().expect("poisoned").clone();
        for id in order.into_iter().rev() {
            if let Err(err) = self.unload(&id) {
                tracing::warn!(unit_id = %id, error = %err, "failed to unload unit");
            }
        }
    }

    /// Calls `on_reload` on a unit that advertises reload support.
    /// Refuses otherwise; does not re-parse the manifest.
    pub fn reload(&self, id: &str) -> Result<(), PluginError> {
        let mut containers = self.containers.write().expect("poisoned");
        let container = containers.get_mut(id).ok_or_else(|| PluginError::NotLoaded(id.to_string()))?;

        if !container.scope.instance().supports_reload() {
            return Err(PluginError::ReloadUnsupported(id.to_string()));
        }

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| container.scope.instance_mut().on_reload()));
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(PluginError::Load { unit_id: id.to_string(), message }),
            Err(_) => Err(PluginError::Load { unit_id: id.to_string(), message: "on_reload panicked".to_string() }),
        }
    }

    /// Best-effort reload of every currently loaded unit that supports
    /// it. Returns the ids that failed along with their errors.
    pub fn reload_all(&self) -> Vec<(String, PluginError)> {
        let ids: Vec<String> = self.containers.read().expect("poisoned").keys().cloned().collect();
        let mut failures = Vec::new();
        for id in ids {
            match self.reload(&id) {
                Ok(()) | Err(PluginError::ReloadUnsupported(_)) => {}
                Err(err) => failures.push((id, err)),
            }
        }
        failures
    }

    fn call_on_disable(id: &str, container: &mut Container) {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| container.scope.instance_mut().on_disable()));
        if result.is_err() {
            tracing::warn!(unit_id = %id, "on_disable panicked; forcing Disabled anyway");
        }
    }

    /// Whether `id` currently has a container installed (any state).
    pub fn is_loaded(&self, id: &str) -> bool {
        self.containers.read().expect("poisoned").contains_key(id)
    }

    /// Whether `id` is installed and in state `Enabled`.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.containers
            .read()
            .expect("poisoned")
            .get(id)
            .is_some_and(|c| c.state == UnitState::Enabled)
    }

    /// The current state of `id`, if it has a container.
    pub fn state(&self, id: &str) -> Option<UnitState> {
        self.containers.read().expect("poisoned").get(id).map(|c| c.state)
    }

    /// Descriptors of every currently loaded unit, in no particular
    /// order (use [`Self::load_order`] for load order).
    pub fn list(&self) -> Vec<UnitDescriptor> {
        self.containers.read().expect("poisoned").values().map(|c| c.descriptor.clone()).collect()
    }

    /// The order units were loaded in, oldest first.
    pub fn load_order(&self) -> Vec<String> {
        self.load_order.read().expect("poisoned").clone()
    }

    /// Runs `f` against the live `&dyn Unit` instance for `id`, if
    /// loaded. The reference never escapes the closure -- per spec
    /// §4.1's `Unit Context` note, a unit must look up another unit
    /// through the manager each time rather than caching a reference.
    pub fn with_unit<R>(&self, id: &str, f: impl FnOnce(&dyn crate::unit::Unit) -> R) -> Option<R> {
        let containers = self.containers.read().expect("poisoned");
        containers.get(id).map(|c| f(c.scope.instance()))
    }

    /// Type-erased lookup of another unit's concrete type, built on
    /// [`Self::with_unit`] plus [`Unit::as_any`](crate::unit::Unit::as_any).
    /// Returns a clone rather than a reference, since a reference held
    /// past the container read-lock's scope would violate the
    /// never-cache-cross-unit-references contract [`UnitContext`]
    /// documents.
    pub fn get_as<T: Clone + 'static>(&self, id: &str) -> Option<T> {
        self.with_unit(id, |unit| unit.as_any().downcast_ref::<T>().cloned())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_budget::BudgetManager;
    use std::any::Any;
    use std::sync::Mutex;

    struct RecordingUnit {
        log: Arc<Mutex<Vec<&'static str>>>,
        fail_enable: bool,
    }

    impl crate::unit::Unit for RecordingUnit {
        fn on_load(&mut self, _ctx: &UnitContext) -> Result<(), String> {
            self.log.lock().unwrap().push("load");
            Ok(())
        }

        fn on_enable(&mut self) -> Result<(), String> {
            if self.fail_enable {
                return Err("boom".to_string());
            }
            self.log.lock().unwrap().push("enable");
            Ok(())
        }

        fn on_disable(&mut self) {
            self.log.lock().unwrap().push("disable");
        }

        fn supports_reload(&self) -> bool {
            true
        }

        fn on_reload(&mut self) -> Result<(), String> {
            self.log.lock().unwrap().push("reload");
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn manager(modules_dir: &std::path::Path) -> Arc<PluginManager> {
        let metrics = MetricsRegistry::new();
        let config = Arc::new(ConfigStore::new(modules_dir.join("config")).unwrap());
        let budget = Arc::new(BudgetManager::new(metrics.clone()));
        let rt = tokio::runtime::Runtime::new().unwrap();
        let handle = rt.handle().clone();
        std::mem::forget(rt);
        let scheduler = TickScheduler::start(metrics.clone(), budget, handle).unwrap();
        PluginManager::new(modules_dir.to_path_buf(), metrics, config, scheduler)
    }

    fn descriptor(id: &str, hard: &[&str]) -> UnitDescriptor {
        UnitDescriptor {
            id: id.to_string(),
            version: "1.0.0".to_string(),
            entry_point: format!("{id}_entry"),
            hard_dependencies: hard.iter().map(|s| s.to_string()).collect(),
            soft_dependencies: Default::default(),
            manifest_path: PathBuf::from(format!("{id}.unit.toml")),
            library_path: PathBuf::from(format!("lib{id}.so")),
        }
    }

    /// `load` goes through `UnitScope::load`, which dlopens a real
    /// shared library. These tests exercise the state machine and
    /// dependency checks directly against an installed container,
    /// bypassing `load`'s library step -- the library step itself is
    /// covered by `scope.rs`'s doc contract and integration tests that
    /// build a real fixture `.so`.
    fn install(mgr: &PluginManager, id: &str, log: Arc<Mutex<Vec<&'static str>>>, fail_enable: bool) {
        let unit: Box<dyn crate::unit::Unit> = Box::new(RecordingUnit { log, fail_enable });
        let scope = UnitScope::from_instance(unit);
        mgr.containers.write().unwrap().insert(
            id.to_string(),
            Container { descriptor: descriptor(id, &[]), scope, state: UnitState::Loaded },
        );
        mgr.load_order.write().unwrap().push(id.to_string());
    }

    #[test]
    fn enable_then_disable_round_trips_through_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let log = Arc::new(Mutex::new(Vec::new()));
        install(&mgr, "alpha", log.clone(), false);

        mgr.enable("alpha").unwrap();
        assert!(mgr.is_enabled("alpha"));
        mgr.disable("alpha").unwrap();
        assert_eq!(mgr.state("alpha"), Some(UnitState::Disabled));
        assert_eq!(*log.lock().unwrap(), vec!["load", "enable", "disable"]);
    }

    #[test]
    fn failed_enable_transitions_to_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let log = Arc::new(Mutex::new(Vec::new()));
        install(&mgr, "alpha", log, true);

        assert!(mgr.enable("alpha").is_err());
        assert_eq!(mgr.state("alpha"), Some(UnitState::Failed));
    }

    #[test]
    fn disable_requires_enabled_state() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let log = Arc::new(Mutex::new(Vec::new()));
        install(&mgr, "alpha", log, false);

        assert!(matches!(mgr.disable("alpha"), Err(PluginError::IllegalTransition { .. })));
    }

    #[test]
    fn unload_calls_disable_when_active_then_removes_container() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let log = Arc::new(Mutex::new(Vec::new()));
        install(&mgr, "alpha", log.clone(), false);
        mgr.enable("alpha").unwrap();

        mgr.unload("alpha").unwrap();
        assert!(!mgr.is_loaded("alpha"));
        assert_eq!(*log.lock().unwrap(), vec!["load", "enable", "disable"]);
    }

    #[test]
    fn reload_invokes_on_reload_when_supported() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let log = Arc::new(Mutex::new(Vec::new()));
        install(&mgr, "alpha", log.clone(), false);

        mgr.reload("alpha").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["load", "reload"]);
    }

    #[test]
    fn load_rejects_missing_hard_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let err = mgr.load(descriptor("dependent", &["missing"])).unwrap_err();
        assert!(matches!(err, PluginError::Dependency { .. }));
        assert!(!mgr.is_loaded("dependent"));
    }

    #[test]
    fn unload_all_runs_in_reverse_load_order() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let log = Arc::new(Mutex::new(Vec::new()));
        install(&mgr, "a", log.clone(), false);
        install(&mgr, "b", log.clone(), false);
        mgr.enable("a").unwrap();
        mgr.enable("b").unwrap();

        mgr.unload_all();
        assert!(!mgr.is_loaded("a"));
        assert!(!mgr.is_loaded("b"));
        assert_eq!(mgr.load_order(), Vec::<String>::new());
    }
}
