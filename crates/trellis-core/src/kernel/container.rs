use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// A value stored in the [`Container`]
pub type Service = Arc<dyn Any + Send + Sync>;

/// Shared service registry keyed by string.
///
/// Keys are namespaced by convention (`driver/api`, `module/status`) next to a
/// handful of constant keys (`config`, `logger`, ...). Cloning a `Container`
/// clones the handle, not the contents: every clone sees the same entries.
/// Values are untyped; [`Container::get`] downcasts on the way out.
#[derive(Clone, Default)]
pub struct Container {
    services: Arc<RwLock<HashMap<String, Service>>>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.keys())
            .finish()
    }
}

impl Container {
    /// Create a new empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container preloaded with `entries`; later pairs overwrite earlier ones
    pub fn with<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Service)>,
    {
        let container = Self::new();
        for (key, value) in entries {
            container.set_shared(key, value);
        }
        container
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn set<V>(&self, key: impl Into<String>, value: V)
    where
        V: Any + Send + Sync,
    {
        self.set_shared(key, Arc::new(value));
    }

    /// Store an already shared value under `key`, replacing any previous value
    pub fn set_shared(&self, key: impl Into<String>, value: Service) {
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Get the value under `key` if it exists and has type `T`
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get_raw(key).and_then(|service| service.downcast::<T>().ok())
    }

    /// Get the untyped value under `key`
    pub fn get_raw(&self, key: &str) -> Option<Service> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Service> {
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Sorted keys starting with `prefix`, e.g. `"module/"`
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
