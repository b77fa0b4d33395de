//! [`ConfigStore`]: the runtime-facing API over a collection of
//! type-erased, file-backed configs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::ConfigError;
use crate::holder::Holder;
use crate::typed::TypedConfig;
use crate::watcher::WatcherHandle;

/// Owns every registered typed config for a runtime instance and the
/// file watcher that drives hot-reload.
///
/// Each config is addressed by a string id and backed by
/// `{config_dir}/{id}.properties`. Registration is type-safe
/// (`register::<T>`); lookups after that point can go through either
/// the typed `get::<T>` or id-only operations like `reload`/`save`
/// that don't need the caller to restate `T`.
pub struct ConfigStore {
    config_dir: PathBuf,
    holders: RwLock<HashMap<String, Arc<Holder>>>,
    initialized: AtomicBool,
    watcher: RwLock<Option<WatcherHandle>>,
}

impl ConfigStore {
    /// Creates a store rooted at `config_dir`. The directory is created
    /// if it doesn't exist; no files are read until [`register`] is
    /// called.
    ///
    /// [`register`]: ConfigStore::register
    pub fn new(config_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_dir = config_dir.into();
        std::fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
            id: "<config_dir>".to_string(),
            source,
        })?;
        Ok(Self {
            config_dir,
            holders: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            watcher: RwLock::new(None),
        })
    }

    /// Registers a typed config under `id`, loading its initial value
    /// from `{config_dir}/{id}.properties`, or, if that file doesn't
    /// exist yet, serializing `T::default()` to it so the file appears
    /// with exactly the default's keys. Re-registering an id that's
    /// already present replaces it.
    pub fn register<T: TypedConfig>(&self, id: impl Into<String>) -> Result<(), ConfigError> {
        let id = id.into();
        let path = self.path_for(&id);
        let holder = Holder::new::<T>(id.clone(), path)?;
        self.holders.write().expect("store lock poisoned").insert(id, Arc::new(holder));
        Ok(())
    }

    /// Returns a clone of the current value registered under `id`.
    pub fn get<T: TypedConfig>(&self, id: &str) -> Result<T, ConfigError> {
        self.holder(id)?.get::<T>()
    }

    /// Re-reads `id`'s backing file and, if it validates, swaps in the
    /// new value and fires any registered listeners. The previous value
    /// is retained if reload fails.
    pub fn reload(&self, id: &str) -> Result<(), ConfigError> {
        self.holder(id)?.reload()
    }

    /// Reloads every registered config, in registration order by id.
    /// Returns the ids that failed to reload along with their errors;
    /// successfully reloaded configs are still applied even if a later
    /// one fails.
    pub fn reload_all(&self) -> Vec<(String, ConfigError)> {
        let holders: Vec<Arc<Holder>> = {
            let guard = self.holders.read().expect("store lock poisoned");
            guard.values().cloned().collect()
        };
        let mut failures = Vec::new();
        for holder in holders {
            if let Err(err) = holder.reload() {
                tracing::warn!(id = %holder.id, error = %err, "config reload failed");
                failures.push((holder.id.clone(), err));
            }
        }
        failures
    }

    /// Writes `id`'s current value back to its backing file.
    pub fn save(&self, id: &str) -> Result<(), ConfigError> {
        self.holder(id)?.save()
    }

    /// Registers a listener invoked with `(old, new)` whenever `id` is
    /// reloaded, whether triggered by [`reload`](Self::reload),
    /// [`reload_all`](Self::reload_all), or the file watcher.
    pub fn on_reload<T, F>(&self, id: &str, listener: F) -> Result<(), ConfigError>
    where
        T: TypedConfig,
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.holder(id)?.add_listener::<T, F>(listener)
    }

    /// Starts the background file watcher. Idempotent: calling this
    /// again while a watcher is already running is a no-op.
    pub fn initialize(self: &Arc<Self>) -> Result<(), ConfigError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let handle = WatcherHandle::spawn(self.clone(), self.config_dir.clone())?;
        *self.watcher.write().expect("store lock poisoned") = Some(handle);
        Ok(())
    }

    /// Stops the background file watcher, if running.
    pub fn shutdown(&self) {
        if let Some(handle) = self.watcher.write().expect("store lock poisoned").take() {
            handle.stop();
        }
        self.initialized.store(false, Ordering::SeqCst);
    }

    /// Looks up the holder whose backing file stem matches `file_stem`,
    /// used by the watcher to map a changed path back to a registered
    /// id without assuming ids and file stems are always identical.
    pub(crate) fn holder_for_stem(&self, file_stem: &str) -> Option<Arc<Holder>> {
        self.holders.read().expect("store lock poisoned").get(file_stem).cloned()
    }

    fn holder(&self, id: &str) -> Result<Arc<Holder>, ConfigError> {
        self.holders
            .read()
            .expect("store lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::UnregisteredId(id.to_string()))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.config_dir.join(format!("{id}.properties"))
    }

    /// The directory this store persists configs under.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

impl Drop for ConfigStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
