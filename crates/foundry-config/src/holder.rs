//! Type-erased storage for one registered config, plus its reload
//! listeners.
//!
//! [`ConfigStore`](crate::ConfigStore) keeps a `HashMap<String,
//! Arc<Holder>>` so that operations addressed only by id — `reload`,
//! `save`, the file watcher's dispatch — don't need the caller to name
//! the concrete type again. The holder captures a `reload_fn` closure
//! at registration time, monomorphized over the concrete `T`, which is
//! the only place the erasure is actually bridged back to a type.

use std::any::{Any, TypeId};
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use crate::error::ConfigError;
use crate::properties;
use crate::typed::TypedConfig;

/// Notified with the old and new value whenever a config is reloaded,
/// whether triggered manually or by the file watcher.
///
/// Type-erased at the trait level; [`TypedListener`] bridges a
/// concrete `Fn(&T, &T)` closure into this interface.
pub trait ReloadListener: Send + Sync {
    fn notify(&self, old: &dyn Any, new: &dyn Any);
}

/// Wraps a closure `F: Fn(&T, &T)` so it can be stored as a
/// `Box<dyn ReloadListener>` alongside listeners for other types.
pub struct TypedListener<T, F> {
    func: F,
    _marker: std::marker::PhantomData<fn(&T, &T)>,
}

impl<T, F> TypedListener<T, F>
where
    T: 'static,
    F: Fn(&T, &T) + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func, _marker: std::marker::PhantomData }
    }
}

impl<T, F> ReloadListener for TypedListener<T, F>
where
    T: 'static,
    F: Fn(&T, &T) + Send + Sync,
{
    fn notify(&self, old: &dyn Any, new: &dyn Any) {
        let (Some(old), Some(new)) = (old.downcast_ref::<T>(), new.downcast_ref::<T>()) else {
            tracing::error!("reload listener type mismatch, dropping notification");
            return;
        };
        (self.func)(old, new);
    }
}

/// One registered config: its backing file, its current value, and the
/// listeners waiting on its next reload.
pub struct Holder {
    pub id: String,
    pub path: PathBuf,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub value: RwLock<Box<dyn Any + Send + Sync>>,
    pub listeners: Mutex<Vec<Box<dyn ReloadListener>>>,
    reload_fn: Box<dyn Fn(&Holder) -> Result<(), ConfigError> + Send + Sync>,
    save_fn: Box<dyn Fn(&Holder) -> Result<(), ConfigError> + Send + Sync>,
}

impl Holder {
    /// Builds a holder for concrete type `T`, reading its initial value
    /// from `path` if it exists (a missing file falls back to
    /// `T::default()` with validation still applied). When `path` didn't
    /// exist, the validated default is written out immediately so the
    /// file appears on disk with exactly the default's keys.
    pub fn new<T: TypedConfig>(id: String, path: PathBuf) -> Result<Self, ConfigError> {
        let existed = path.exists();
        let initial = Self::load_from_disk::<T>(&id, &path)?;
        let messages = initial.validate();
        if !messages.is_empty() {
            return Err(ConfigError::Validation { id, messages });
        }

        let holder = Self {
            id,
            path,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: RwLock::new(Box::new(initial)),
            listeners: Mutex::new(Vec::new()),
            reload_fn: Box::new(Self::reload_impl::<T>),
            save_fn: Box::new(Self::save_impl::<T>),
        };
        if !existed {
            holder.save()?;
        }
        Ok(holder)
    }

    fn load_from_disk<T: TypedConfig>(id: &str, path: &std::path::Path) -> Result<T, ConfigError> {
        let mut value = T::default();
        if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                id: id.to_string(),
                source,
            })?;
            let kv = properties::parse(id, &text)?;
            let kv = T::migrate(T::schema_version(), kv)?;
            value.load(&kv)?;
        }
        Ok(value)
    }

    fn reload_impl<T: TypedConfig>(holder: &Holder) -> Result<(), ConfigError> {
        let new_value = Self::load_from_disk::<T>(&holder.id, &holder.path)?;
        let messages = new_value.validate();
        if !messages.is_empty() {
            return Err(ConfigError::Validation { id: holder.id.clone(), messages });
        }

        let old_boxed: Box<dyn Any + Send + Sync> = {
            let mut guard = holder.value.write().expect("config lock poisoned");
            std::mem::replace(&mut *guard, Box::new(new_value.clone()))
        };

        let listeners = holder.listeners.lock().expect("listener lock poisoned");
        for listener in listeners.iter() {
            listener.notify(old_boxed.as_ref(), &new_value as &dyn Any);
        }
        Ok(())
    }

    fn save_impl<T: TypedConfig>(holder: &Holder) -> Result<(), ConfigError> {
        let guard = holder.value.read().expect("config lock poisoned");
        let value = guard.downcast_ref::<T>().expect("holder type invariant violated");
        let mut kv = properties::PropertiesMap::new();
        value.save(&mut kv);
        let text = properties::write(&kv);
        std::fs::write(&holder.path, text).map_err(|source| ConfigError::Io {
            id: holder.id.clone(),
            source,
        })
    }

    /// Re-reads the backing file, validates, swaps the stored value,
    /// and notifies listeners. Leaves the previous value in place on
    /// error.
    pub fn reload(&self) -> Result<(), ConfigError> {
        (self.reload_fn)(self)
    }

    /// Writes the current value back out to the backing file.
    pub fn save(&self) -> Result<(), ConfigError> {
        (self.save_fn)(self)
    }

    pub fn get<T: TypedConfig>(&self) -> Result<T, ConfigError> {
        if self.type_id != TypeId::of::<T>() {
            return Err(ConfigError::TypeMismatch {
                id: self.id.clone(),
                registered_type: self.type_name,
            });
        }
        let guard = self.value.read().expect("config lock poisoned");
        Ok(guard.downcast_ref::<T>().expect("holder type invariant violated").clone())
    }

    pub fn add_listener<T, F>(&self, listener: F) -> Result<(), ConfigError>
    where
        T: TypedConfig,
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        if self.type_id != TypeId::of::<T>() {
            return Err(ConfigError::TypeMismatch {
                id: self.id.clone(),
                registered_type: self.type_name,
            });
        }
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .push(Box::new(TypedListener::<T, F>::new(listener)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default, Clone, PartialEq, Debug)]
    struct Sample {
        value: u32,
    }

    impl TypedConfig for Sample {
        fn load(&mut self, kv: &properties::PropertiesMap) -> Result<(), ConfigError> {
            if let Some(v) = kv.get("value") {
                self.value = v.parse().unwrap_or_default();
            }
            Ok(())
        }

        fn save(&self, kv: &mut properties::PropertiesMap) {
            kv.insert("value".to_string(), self.value.to_string());
        }
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let holder = Holder::new::<Sample>("sample".to_string(), dir.path().join("sample.properties")).unwrap();
        assert_eq!(holder.get::<Sample>().unwrap(), Sample::default());
    }

    #[test]
    fn missing_file_is_written_out_with_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.properties");
        Holder::new::<Sample>("sample".to_string(), path.clone()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "value=0\n");
    }

    #[test]
    fn existing_file_is_left_untouched_by_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.properties");
        std::fs::write(&path, "value=5\n").unwrap();
        Holder::new::<Sample>("sample".to_string(), path.clone()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "value=5\n");
    }

    #[test]
    fn reload_picks_up_file_changes_and_fires_listener() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.properties");
        std::fs::write(&path, "value=1\n").unwrap();
        let holder = Holder::new::<Sample>("sample".to_string(), path.clone()).unwrap();
        assert_eq!(holder.get::<Sample>().unwrap().value, 1);

        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();
        holder
            .add_listener::<Sample, _>(move |_old: &Sample, new: &Sample| {
                seen_clone.store(new.value, Ordering::SeqCst);
            })
            .unwrap();

        std::fs::write(&path, "value=2\n").unwrap();
        holder.reload().unwrap();
        assert_eq!(holder.get::<Sample>().unwrap().value, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn get_with_wrong_type_is_a_type_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let holder = Holder::new::<Sample>("sample".to_string(), dir.path().join("sample.properties")).unwrap();

        #[derive(Default, Clone)]
        struct Other;
        impl TypedConfig for Other {
            fn load(&mut self, _: &properties::PropertiesMap) -> Result<(), ConfigError> {
                Ok(())
            }
            fn save(&self, _: &mut properties::PropertiesMap) {}
        }

        let err = holder.get::<Other>().unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
    }

    #[test]
    fn save_writes_current_value_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.properties");
        let holder = Holder::new::<Sample>("sample".to_string(), path.clone()).unwrap();
        std::fs::write(&path, "value=9\n").unwrap();
        holder.reload().unwrap();
        holder.save().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "value=9\n");
    }
}
