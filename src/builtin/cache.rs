use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::traits::Provides;
use crate::{DiResult, ResolutionContext};

/// Key/value cache capability.
pub trait Cache: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn delete(&self, key: &str);
    /// Drops every entry.
    fn close(&self);
}

impl<C: Cache> Provides<dyn Cache> for C {
    fn upcast(self: Arc<Self>) -> Arc<dyn Cache> {
        self
    }
}

/// In-process [`Cache`]. Meant to be registered as a singleton.
///
/// # Examples
///
/// ```
/// use scopeline::builtin::{Cache, MemoryCache};
/// use serde_json::json;
///
/// let cache = MemoryCache::default();
/// cache.set("user:1", json!({ "name": "ada" }));
/// assert_eq!(cache.get("user:1").unwrap()["name"], "ada");
/// cache.close();
/// assert!(cache.get("user:1").is_none());
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    store: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new(_: &ResolutionContext) -> DiResult<Self> {
        Ok(Self::default())
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.store.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.store.write().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.store.write().remove(key);
    }

    fn close(&self) {
        self.store.write().clear();
    }
}
