//! Scope store: per-scope instance caches with an explicit create/delete lifecycle.
//!
//! Each scope is a separate entry with its own lock, so requests never contend
//! with each other. Inside a scope every cache slot owns a build-once cell:
//! concurrent first access to one slot runs the builder exactly once and the
//! losers wait for the winner's value. No lock is held while a builder runs
//! apart from that slot's own cell.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::key::SlotKey;
use crate::registration::Instance;

type Slot = Arc<OnceCell<Instance>>;

struct ScopeEntry {
    id: String,
    state: Mutex<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    deleted: bool,
    slots: HashMap<SlotKey, Slot>,
}

impl ScopeEntry {
    fn slot(&self, key: SlotKey) -> DiResult<Slot> {
        let mut state = self.state.lock();
        if state.deleted {
            return Err(DiError::ScopeDeleted(self.id.clone()));
        }
        Ok(state.slots.entry(key).or_default().clone())
    }

    fn is_deleted(&self) -> bool {
        self.state.lock().deleted
    }
}

/// Mapping from scope identifier to that scope's instance cache.
///
/// # Examples
///
/// ```
/// use scopeline::{ScopeStore, SlotKey, Key, Concrete, DiError, Instance};
/// use std::sync::Arc;
///
/// struct Session;
/// let store = ScopeStore::new();
/// let slot = SlotKey::new(Key::of::<Session>(), Concrete::of::<Session>());
///
/// store.create_scope("request-1").unwrap();
/// let a = store.get_or_build("request-1", slot, || Ok(Arc::new(Arc::new(Session)) as Instance)).unwrap();
/// let b = store.get_or_build("request-1", slot, || unreachable!()).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// store.delete_scope("request-1").unwrap();
/// let gone = store.get_or_build("request-1", slot, || unreachable!());
/// assert!(matches!(gone, Err(DiError::ScopeNotFound(_))));
/// ```
#[derive(Default)]
pub struct ScopeStore {
    scopes: DashMap<String, Arc<ScopeEntry>>,
}

impl ScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an empty cache under `scope_id`.
    ///
    /// Creating a scope that already exists is reported as
    /// [`DiError::ScopeExists`]; the existing cache is left untouched.
    pub fn create_scope(&self, scope_id: impl Into<String>) -> DiResult<()> {
        let scope_id = scope_id.into();
        match self.scopes.entry(scope_id) {
            Entry::Occupied(existing) => Err(DiError::ScopeExists(existing.key().clone())),
            Entry::Vacant(vacant) => {
                let entry = Arc::new(ScopeEntry {
                    id: vacant.key().clone(),
                    state: Mutex::new(ScopeState::default()),
                });
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    /// Evicts and discards the cache under `scope_id`.
    ///
    /// Builds still in flight for this scope finish their builder but then
    /// fail with [`DiError::ScopeDeleted`] instead of publishing into a dead
    /// scope.
    pub fn delete_scope(&self, scope_id: &str) -> DiResult<()> {
        let (_, entry) = self
            .scopes
            .remove(scope_id)
            .ok_or_else(|| DiError::ScopeNotFound(scope_id.to_string()))?;

        let slots = {
            let mut state = entry.state.lock();
            state.deleted = true;
            std::mem::take(&mut state.slots)
        };
        // Instances are released outside the lock; their Drop may be arbitrary code.
        drop(slots);
        Ok(())
    }

    /// Returns the cached instance for `slot`, building it with `build` on first access.
    ///
    /// At most one build runs per (scope, slot) even under concurrent first
    /// access. If the build fails nothing is cached and the error is returned.
    pub fn get_or_build<F>(&self, scope_id: &str, slot: SlotKey, build: F) -> DiResult<Instance>
    where
        F: FnOnce() -> DiResult<Instance>,
    {
        let entry = self.entry(scope_id)?;
        let cell = entry.slot(slot)?;

        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }

        let value = cell.get_or_try_init(build)?.clone();
        if entry.is_deleted() {
            return Err(DiError::ScopeDeleted(scope_id.to_string()));
        }
        Ok(value)
    }

    pub fn contains(&self, scope_id: &str) -> bool {
        self.scopes.contains_key(scope_id)
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Number of instances already built in `scope_id`, if the scope exists.
    pub fn cached(&self, scope_id: &str) -> Option<usize> {
        let entry = self.scopes.get(scope_id)?.clone();
        let state = entry.state.lock();
        Some(state.slots.values().filter(|cell| cell.get().is_some()).count())
    }

    fn entry(&self, scope_id: &str) -> DiResult<Arc<ScopeEntry>> {
        // Clone the Arc so the shard guard is released before any build runs
        self.scopes
            .get(scope_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DiError::ScopeNotFound(scope_id.to_string()))
    }
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("scopes", &self.scopes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Concrete, Key};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    struct Session;
    struct Other;

    fn slot<C: 'static>() -> SlotKey {
        SlotKey::new(Key::of::<C>(), Concrete::of::<C>())
    }

    fn instance() -> DiResult<Instance> {
        Ok(Arc::new(Arc::new(Session)) as Instance)
    }

    #[test]
    fn create_twice_is_reported() {
        let store = ScopeStore::new();
        store.create_scope("a").unwrap();
        assert!(matches!(store.create_scope("a"), Err(DiError::ScopeExists(id)) if id == "a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_unknown_scope_is_reported() {
        let store = ScopeStore::new();
        assert!(matches!(store.delete_scope("nope"), Err(DiError::ScopeNotFound(_))));
    }

    #[test]
    fn slots_are_independent() {
        let store = ScopeStore::new();
        store.create_scope("a").unwrap();
        let first = store.get_or_build("a", slot::<Session>(), instance).unwrap();
        let second = store.get_or_build("a", slot::<Other>(), instance).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(store.cached("a"), Some(2));
    }

    #[test]
    fn scopes_are_independent() {
        let store = ScopeStore::new();
        store.create_scope("a").unwrap();
        store.create_scope("b").unwrap();
        let a = store.get_or_build("a", slot::<Session>(), instance).unwrap();
        let b = store.get_or_build("b", slot::<Session>(), instance).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let store = ScopeStore::new();
        store.create_scope("a").unwrap();
        let failed = store.get_or_build("a", slot::<Session>(), || Err(DiError::build::<Session>("boom")));
        assert!(matches!(failed, Err(DiError::Build { .. })));
        assert_eq!(store.cached("a"), Some(0));
        assert!(store.get_or_build("a", slot::<Session>(), instance).is_ok());
    }

    #[test]
    fn build_once_under_race() {
        let store = Arc::new(ScopeStore::new());
        store.create_scope("a").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .get_or_build("a", slot::<Session>(), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(5));
                            instance()
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn delete_during_build_fails_the_build() {
        let store = Arc::new(ScopeStore::new());
        store.create_scope("a").unwrap();
        let started = Arc::new(Barrier::new(2));
        let deleted = Arc::new(Barrier::new(2));

        let builder = {
            let store = store.clone();
            let started = started.clone();
            let deleted = deleted.clone();
            thread::spawn(move || {
                store.get_or_build("a", slot::<Session>(), || {
                    started.wait();
                    deleted.wait();
                    instance()
                })
            })
        };

        started.wait();
        store.delete_scope("a").unwrap();
        deleted.wait();

        let result = builder.join().unwrap();
        assert!(matches!(result, Err(DiError::ScopeDeleted(_))));
        assert!(!store.contains("a"));
    }
}
