//! [`Runtime`]: the lifecycle orchestrator. Brings up the metrics
//! registry, budget manager, config store, and tick scheduler in order,
//! then asks the plug-in manager to discover, resolve, load, and enable
//! every unit on disk. Tears everything down in reverse.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use foundry_budget::BudgetManager;
use foundry_config::ConfigStore;
use foundry_metrics::MetricsRegistry;
use foundry_plugin::{DiscoverReport, PluginManager};
use foundry_tick::TickScheduler;

use crate::error::ForgeError;

/// Coarse lifecycle state, surfaced for diagnostics and to make
/// double-start/double-stop a safe no-op rather than a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Stopped,
    Running,
}

/// The explicit handle an embedder creates once, retains for the
/// process's lifetime, and passes (never ambiently accessed) into
/// whatever owns the accept loop / main thread. This replaces the
/// teacher-pattern-adjacent source's process-wide singleton -- see
/// DESIGN.md's "Global singleton core" entry.
pub struct Runtime {
    data_dir: PathBuf,
    initialized: AtomicBool,
    running: AtomicBool,
    metrics: MetricsRegistry,
    budget: Arc<BudgetManager>,
    config: Arc<ConfigStore>,
    tokio_rt: Mutex<Option<tokio::runtime::Runtime>>,
    scheduler: RwLock<Option<Arc<TickScheduler>>>,
    plugins: RwLock<Option<Arc<PluginManager>>>,
}

impl Runtime {
    /// Constructs a runtime rooted at `data_dir`. Builds the metrics
    /// registry, budget manager, and config store eagerly (none of
    /// these start background threads); the tick scheduler and plug-in
    /// manager aren't built until [`start`](Self::start).
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, ForgeError> {
        let data_dir = data_dir.into();
        let metrics = MetricsRegistry::new();
        let budget = Arc::new(BudgetManager::new(metrics.clone()));
        let config = Arc::new(ConfigStore::new(data_dir.join("config"))?);

        Ok(Self {
            data_dir,
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            metrics,
            budget,
            config,
            tokio_rt: Mutex::new(None),
            scheduler: RwLock::new(None),
            plugins: RwLock::new(None),
        })
    }

    /// Idempotent one-time filesystem setup: creates `logs/`, `config/`,
    /// and `modules/` under the data directory. Calling this more than
    /// once has the effect of exactly one call (a compare-and-set flag
    /// guards the actual work), matching [`ConfigStore::initialize`]'s
    /// idempotence contract.
    pub fn initialize(&self) -> Result<(), ForgeError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for sub in ["logs", "config", "modules"] {
            std::fs::create_dir_all(self.data_dir.join(sub))?;
        }
        Ok(())
    }

    /// Brings up subsystems in order C1 (metrics, already constructed)
    /// -> C2 (budget, already constructed) -> C3 (config watcher) -> C4
    /// (tick scheduler), then asks C5 to discover, resolve, load, and
    /// enable every unit on disk in dependency order. On any failure,
    /// best-effort rolls back everything already brought up, in
    /// reverse, and returns the error; the runtime is left `Stopped`.
    ///
    /// A second call while already running is a no-op.
    pub fn start(&self) -> Result<(), ForgeError> {
        self.initialize()?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match self.try_start() {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(error = %err, "start failed, rolling back");
                self.teardown();
                self.running.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn try_start(&self) -> Result<(), ForgeError> {
        self.config.initialize()?;

        let tokio_rt = tokio::runtime::Runtime::new()?;
        let handle = tokio_rt.handle().clone();
        *self.tokio_rt.lock().expect("poisoned") = Some(tokio_rt);

        let scheduler = TickScheduler::start(self.metrics.clone(), self.budget.clone(), handle)?;
        *self.scheduler.write().expect("poisoned") = Some(scheduler.clone());

        let modules_dir = self.data_dir.join("modules");
        let manager = PluginManager::new(modules_dir, self.metrics.clone(), self.config.clone(), scheduler);
        let report = manager.discover_and_load()?;
        for id in &report.loaded {
            if let Err(err) = manager.enable(id) {
                tracing::error!(unit_id = %id, error = %err, "unit failed to enable during start");
            }
        }
        log_discover_report(&report);
        *self.plugins.write().expect("poisoned") = Some(manager);

        Ok(())
    }

    /// Unloads every unit in reverse load order, then tears down C4 ->
    /// C3 -> C2 -> C1 (C1/C2 have no running state to stop, so this
    /// reduces to dropping the scheduler and config watcher). A second
    /// call while already stopped is a no-op.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.teardown();
    }

    fn teardown(&self) {
        if let Some(manager) = self.plugins.write().expect("poisoned").take() {
            manager.unload_all();
        }
        if let Some(scheduler) = self.scheduler.write().expect("poisoned").take() {
            scheduler.shutdown();
        }
        self.config.shutdown();
        self.tokio_rt.lock().expect("poisoned").take();
    }

    /// Reloads every registered config, then calls `on_reload` on every
    /// reload-supporting `Enabled` unit. Best-effort: one failure does
    /// not prevent the rest. Returns every config reload failure
    /// followed by every unit reload failure, in that order.
    pub fn reload(&self) -> Vec<(String, ForgeError)> {
        let mut failures: Vec<(String, ForgeError)> = self
            .config
            .reload_all()
            .into_iter()
            .map(|(id, err)| (id, ForgeError::from(err)))
            .collect();

        let Some(manager) = self.plugins.read().expect("poisoned").clone() else {
            return failures;
        };

        for id in manager.load_order() {
            if !manager.is_enabled(&id) {
                continue;
            }
            match manager.reload(&id) {
                Ok(()) | Err(foundry_plugin::PluginError::ReloadUnsupported(_)) => {}
                Err(err) => failures.push((id, ForgeError::from(err))),
            }
        }
        failures
    }

    /// The current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        if self.running.load(Ordering::SeqCst) {
            RuntimeState::Running
        } else {
            RuntimeState::Stopped
        }
    }

    /// The shared metrics registry (C1).
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// The shared budget manager (C2).
    pub fn budget(&self) -> &Arc<BudgetManager> {
        &self.budget
    }

    /// The shared config store (C3).
    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// The running tick scheduler (C4), if [`start`](Self::start) has
    /// brought it up.
    pub fn scheduler(&self) -> Option<Arc<TickScheduler>> {
        self.scheduler.read().expect("poisoned").clone()
    }

    /// The plug-in manager (C5), if [`start`](Self::start) has brought
    /// it up.
    pub fn plugins(&self) -> Option<Arc<PluginManager>> {
        self.plugins.read().expect("poisoned").clone()
    }

    /// The data directory this runtime was constructed with.
    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_discover_report(report: &DiscoverReport) {
    tracing::info!(
        loaded = report.loaded.len(),
        excluded = report.excluded.len(),
        failed_to_load = report.failed_to_load.len(),
        parse_failures = report.parse_failures.len(),
        "unit discovery complete"
    );
    for (id, reason) in &report.excluded {
        tracing::warn!(unit_id = %id, reason, "unit excluded by dependency resolution");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_creates_standard_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(dir.path()).unwrap();
        runtime.initialize().unwrap();
        assert!(dir.path().join("logs").is_dir());
        assert!(dir.path().join("config").is_dir());
        assert!(dir.path().join("modules").is_dir());
    }

    #[test]
    fn initialize_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(dir.path()).unwrap();
        runtime.initialize().unwrap();
        std::fs::remove_dir(dir.path().join("logs")).unwrap();
        runtime.initialize().unwrap();
        // Second call short-circuited on the flag, so it did not
        // recreate the directory we just removed.
        assert!(!dir.path().join("logs").is_dir());
    }

    #[test]
    fn start_with_empty_modules_dir_succeeds_and_leaves_runtime_running() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(dir.path()).unwrap();
        runtime.start().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Running);
        assert!(runtime.scheduler().is_some());
        assert!(runtime.plugins().is_some());
        runtime.stop();
        assert_eq!(runtime.state(), RuntimeState::Stopped);
    }

    #[test]
    fn double_start_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(dir.path()).unwrap();
        runtime.start().unwrap();
        runtime.start().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Running);
        runtime.stop();
    }

    #[test]
    fn double_stop_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(dir.path()).unwrap();
        runtime.start().unwrap();
        runtime.stop();
        runtime.stop();
        assert_eq!(runtime.state(), RuntimeState::Stopped);
    }

    #[test]
    fn reload_with_no_configs_or_units_returns_no_failures() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(dir.path()).unwrap();
        runtime.start().unwrap();
        assert!(runtime.reload().is_empty());
        runtime.stop();
    }
}
