//! Service registration types.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{Concrete, Key, SlotKey};
use crate::provider::ResolutionContext;

/// A type-erased resolved instance. Holds an `Arc<T>` for capability `T`.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased builder. The erased value is always an `Arc<T>` where `T` is the capability.
pub(crate) type Ctor = Arc<dyn Fn(&ResolutionContext) -> DiResult<Instance> + Send + Sync>;

/// One builder for one (capability, concrete type) pair
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) concrete: Concrete,
    pub(crate) ctor: Ctor,
}

impl Registration {
    pub(crate) fn new(concrete: Concrete, ctor: Ctor) -> Self {
        Self { concrete, ctor }
    }

    /// Cache slot this registration occupies when resolved as `capability`.
    #[inline]
    pub(crate) fn slot(&self, capability: Key) -> SlotKey {
        SlotKey::new(capability, self.concrete)
    }
}

/// Capability-indexed multi-map of builders.
///
/// Populated at startup by [`ServiceCollection`](crate::ServiceCollection) and
/// frozen afterwards, so lookups take no lock.
#[derive(Default)]
pub(crate) struct Registry {
    many: HashMap<Key, Vec<Registration>>,
    /// Capabilities in first-registration order
    order: Vec<Key>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a builder; registration order within a capability is preserved.
    pub(crate) fn insert(&mut self, key: Key, registration: Registration) {
        match self.many.get_mut(&key) {
            Some(regs) => regs.push(registration),
            None => {
                self.order.push(key);
                self.many.insert(key, vec![registration]);
            }
        }
    }

    /// Every builder registered under `key`, in registration order.
    #[inline]
    pub(crate) fn lookup_all(&self, key: &Key) -> &[Registration] {
        self.many.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The builder for a single-valued capability. Last registration wins.
    #[inline]
    pub(crate) fn lookup_one(&self, key: &Key) -> DiResult<&Registration> {
        self.lookup_all(key)
            .last()
            .ok_or(DiError::NotFound(key.display_name()))
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.many.contains_key(key)
    }

    /// Iterator over all key-registration pairs in registration order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &Registration)> {
        self.order
            .iter()
            .flat_map(move |key| self.lookup_all(key).iter().map(move |reg| (key, reg)))
    }

    pub(crate) fn len(&self) -> usize {
        self.many.values().map(Vec::len).sum()
    }

    /// Rejects a concrete type registered twice under the same capability,
    /// since both registrations would share one cache slot.
    pub(crate) fn check_duplicates(&self) -> DiResult<()> {
        for key in &self.order {
            let mut seen = HashSet::new();
            for reg in self.lookup_all(key) {
                if !seen.insert(reg.concrete) {
                    return Err(DiError::DuplicateRegistration {
                        capability: key.display_name(),
                        concrete: reg.concrete.name,
                    });
                }
            }
        }
        Ok(())
    }
}
