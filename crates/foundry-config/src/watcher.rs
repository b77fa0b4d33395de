//! Background filesystem watcher that drives automatic config
//! hot-reload.
//!
//! Changes are debounced: a burst of writes to the same file (common
//! with editors that write-then-rename) collapses into a single
//! reload roughly 100ms after the last event settles.

use std::path::PathBuf;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::ConfigError;
use crate::store::ConfigStore;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Handle to a running watcher thread. Dropping or calling [`stop`]
/// signals the thread to exit and joins it.
///
/// [`stop`]: WatcherHandle::stop
pub struct WatcherHandle {
    shutdown: Sender<()>,
    join: Option<std::thread::JoinHandle<()>>,
    _fs_watcher: RecommendedWatcher,
}

impl WatcherHandle {
    pub fn spawn(store: Arc<ConfigStore>, config_dir: PathBuf) -> Result<Self, ConfigError> {
        let (fs_tx, fs_rx) = channel::<notify::Result<notify::Event>>();
        let mut fs_watcher = notify::recommended_watcher(move |res| {
            let _ = fs_tx.send(res);
        })
        .map_err(|source| ConfigError::Io {
            id: "<watcher>".to_string(),
            source: std::io::Error::other(source),
        })?;
        fs_watcher
            .watch(&config_dir, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::Io {
                id: "<watcher>".to_string(),
                source: std::io::Error::other(source),
            })?;

        let (shutdown_tx, shutdown_rx) = channel::<()>();
        let join = std::thread::Builder::new()
            .name("foundry-config-watcher".to_string())
            .spawn(move || Self::run(store, fs_rx, shutdown_rx))
            .expect("failed to spawn config watcher thread");

        Ok(Self { shutdown: shutdown_tx, join: Some(join), _fs_watcher: fs_watcher })
    }

    fn run(
        store: Arc<ConfigStore>,
        fs_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
        shutdown_rx: std::sync::mpsc::Receiver<()>,
    ) {
        let mut pending: Option<(PathBuf, std::time::Instant)> = None;
        loop {
            if shutdown_rx.try_recv().is_ok() {
                return;
            }

            match fs_rx.recv_timeout(DEBOUNCE) {
                Ok(Ok(event)) => {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        if let Some(path) = event.paths.into_iter().next() {
                            pending = Some((path, std::time::Instant::now()));
                        }
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "config watcher saw a filesystem error");
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }

            if let Some((path, seen_at)) = &pending {
                if seen_at.elapsed() >= DEBOUNCE {
                    Self::dispatch_reload(&store, path);
                    pending = None;
                }
            }
        }
    }

    fn dispatch_reload(store: &ConfigStore, path: &std::path::Path) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        let Some(holder) = store.holder_for_stem(stem) else {
            return;
        };
        match holder.reload() {
            Ok(()) => tracing::info!(id = stem, "config hot-reloaded from disk"),
            Err(err) => tracing::warn!(id = stem, error = %err, "config hot-reload failed, keeping previous value"),
        }
    }

    pub fn stop(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::TypedConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    #[derive(Default, Clone)]
    struct Sample {
        value: u32,
    }

    impl TypedConfig for Sample {
        fn load(&mut self, kv: &crate::properties::PropertiesMap) -> Result<(), ConfigError> {
            if let Some(v) = kv.get("value") {
                self.value = v.parse().unwrap_or_default();
            }
            Ok(())
        }

        fn save(&self, kv: &mut crate::properties::PropertiesMap) {
            kv.insert("value".to_string(), self.value.to_string());
        }
    }

    #[test]
    fn file_write_triggers_automatic_reload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sample.properties"), "value=1\n").unwrap();
        let store = Arc::new(ConfigStore::new(dir.path()).unwrap());
        store.register::<Sample>("sample").unwrap();

        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();
        store
            .on_reload::<Sample, _>("sample", move |_old: &Sample, new: &Sample| {
                seen_clone.store(new.value, Ordering::SeqCst);
            })
            .unwrap();

        store.initialize().unwrap();
        std::fs::write(dir.path().join("sample.properties"), "value=7\n").unwrap();

        let deadline = std::time::Instant::now() + StdDuration::from_secs(5);
        while std::time::Instant::now() < deadline && seen.load(Ordering::SeqCst) != 7 {
            std::thread::sleep(StdDuration::from_millis(50));
        }
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        store.shutdown();
    }
}
