//! The resolver: dispatches a resolution by lifetime onto the scope store.
//!
//! A [`Container`] owns the frozen registry, the scope store, and the
//! identifier of the application scope that backs every Singleton.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::internal::with_circular_check;
use crate::key::{Key, SlotKey};
use crate::registration::{Instance, Registration, Registry};
use crate::{DiError, DiResult, Lifetime};

pub mod context;
pub mod scope;

pub use context::ResolutionContext;
pub use scope::ScopeStore;

/// Format of the application scope identifier.
pub fn application_scope_id(application: &str) -> String {
    format!("scopeline:app:{}", application)
}

/// Format of a request scope identifier.
pub fn request_scope_id(request_id: &str) -> String {
    format!("scopeline:request:{}", request_id)
}

/// Registry plus scope store, shared by every request.
///
/// Cloning is cheap; all clones share the same caches.
///
/// # Examples
///
/// ```
/// use scopeline::{ServiceCollection, Lifetime, ResolutionContext};
/// use std::sync::Arc;
///
/// struct Database { url: String }
///
/// let mut services = ServiceCollection::new();
/// services.add_service(|_| Ok(Database { url: "postgres://localhost".into() }));
///
/// let container = services.build().unwrap();
/// let ctx = ResolutionContext::application(&container);
/// let a = ctx.get::<Database>(Lifetime::Singleton).unwrap();
/// let b = ctx.get::<Database>(Lifetime::Singleton).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: Registry,
    store: ScopeStore,
    application_scope: String,
    cancellation: CancellationToken,
    prewarm: Vec<Key>,
}

impl Container {
    /// Wraps a frozen registry and creates the application scope.
    pub(crate) fn new(registry: Registry, application: &str, prewarm: Vec<Key>) -> DiResult<Self> {
        let application_scope = application_scope_id(application);
        let store = ScopeStore::new();
        store.create_scope(application_scope.clone())?;

        Ok(Self {
            inner: Arc::new(ContainerInner {
                registry,
                store,
                application_scope,
                cancellation: CancellationToken::new(),
                prewarm,
            }),
        })
    }

    pub fn store(&self) -> &ScopeStore {
        &self.inner.store
    }

    pub fn application_scope(&self) -> &str {
        &self.inner.application_scope
    }

    /// Parent of every request's cancellation signal.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    /// Resolves a single-valued capability. The last registration wins.
    pub fn resolve(&self, key: &Key, lifetime: Lifetime, ctx: &ResolutionContext) -> DiResult<Instance> {
        let reg = self.inner.registry.lookup_one(key)?;
        self.resolve_registration(*key, reg, lifetime, ctx)
    }

    /// Resolves every builder registered for `key`, in registration order.
    ///
    /// Each concrete type gets its own cache slot. Zero registrations is an
    /// empty result, not an error.
    pub fn resolve_all(&self, key: &Key, lifetime: Lifetime, ctx: &ResolutionContext) -> DiResult<Vec<Instance>> {
        self.inner
            .registry
            .lookup_all(key)
            .iter()
            .map(|reg| self.resolve_registration(*key, reg, lifetime, ctx))
            .collect()
    }

    pub fn is_registered(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }

    /// Registered (capability, concrete type) pairs in registration order.
    pub fn registrations(&self) -> Vec<(Key, &'static str)> {
        self.inner
            .registry
            .iter()
            .map(|(key, reg)| (*key, reg.concrete.name))
            .collect()
    }

    /// Builds every prewarmed capability in the application scope.
    pub fn prewarm(&self) -> DiResult<()> {
        let ctx = ResolutionContext::application(self);
        for key in &self.inner.prewarm {
            tracing::debug!(capability = %key, "prewarming singleton");
            self.resolve_all(key, Lifetime::Singleton, &ctx)?;
        }
        Ok(())
    }

    /// Cancels outstanding work and drops the application scope.
    pub fn shutdown(&self) -> DiResult<()> {
        self.inner.cancellation.cancel();
        self.inner.store.delete_scope(&self.inner.application_scope)
    }

    /// Logs the registrations in build order.
    pub fn inspect(&self) {
        for (index, (key, concrete)) in self.registrations().into_iter().enumerate() {
            tracing::debug!(index, capability = %key, concrete, "registered");
        }
    }

    fn resolve_registration(
        &self,
        key: Key,
        reg: &Registration,
        lifetime: Lifetime,
        ctx: &ResolutionContext,
    ) -> DiResult<Instance> {
        let slot = reg.slot(key);
        // Cycle check wraps the cache lookup: a builder re-entering its own
        // slot must fail before it blocks on its own build-once cell.
        with_circular_check(slot, || match lifetime {
            Lifetime::Singleton => {
                // Singletons outlive the request; they never see its scope.
                let detached = ctx.detached();
                self.inner.store.get_or_build(&self.inner.application_scope, slot, || {
                    self.invoke(slot, reg, &detached)
                })
            }
            Lifetime::Scoped => {
                let scope = ctx.scope_id().ok_or(DiError::WrongLifetime(
                    "Cannot resolve scoped service outside of a request scope",
                ))?;
                self.inner
                    .store
                    .get_or_build(scope, slot, || self.invoke(slot, reg, ctx))
            }
            Lifetime::Transient => self.invoke(slot, reg, ctx),
        })
    }

    fn invoke(&self, slot: SlotKey, reg: &Registration, ctx: &ResolutionContext) -> DiResult<Instance> {
        ctx.cancellation().check()?;
        tracing::trace!(slot = ?slot, "building");
        (reg.ctor)(ctx)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.inner.registry.len())
            .field("application_scope", &self.inner.application_scope)
            .field("store", &self.inner.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceCollection;

    #[test]
    fn scope_id_formats() {
        assert_eq!(application_scope_id("demo"), "scopeline:app:demo");
        assert_eq!(request_scope_id("7"), "scopeline:request:7");
    }

    #[test]
    fn application_scope_exists_until_shutdown() {
        let container = ServiceCollection::new().build().unwrap();
        assert!(container.store().contains(container.application_scope()));
        container.shutdown().unwrap();
        assert!(!container.store().contains(container.application_scope()));
        assert!(container.cancellation().is_cancelled());
    }

    #[test]
    fn singletons_fail_after_shutdown() {
        struct Clock;
        let mut services = ServiceCollection::new();
        services.add_service(|_| Ok(Clock));
        let container = services.build().unwrap();
        container.shutdown().unwrap();

        // The context is not cancelled, only the application scope is gone
        let ctx = ResolutionContext::for_scope(&container, "other", CancellationToken::new());
        let result = ctx.get::<Clock>(Lifetime::Singleton);
        assert!(matches!(result, Err(DiError::ScopeNotFound(_))));
    }
}
