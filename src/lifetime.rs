//! Service lifetime definitions.

/// Caching policy applied when a capability is resolved.
///
/// The lifetime is chosen by the caller of a resolution, not by the
/// registration: the same builder can be resolved as a process-wide singleton
/// in one place and per request in another.
///
/// # Examples
///
/// ```rust
/// use scopeline::{ServiceCollection, Lifetime, ResolutionContext, CancellationToken};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_service(|_| Ok(Database { url: "postgres://localhost".into() }));
/// services.add_service(|ctx| Ok(Repository { db: ctx.get::<Database>(Lifetime::Singleton)? }));
///
/// let container = services.build().unwrap();
/// container.store().create_scope("r1").unwrap();
/// container.store().create_scope("r2").unwrap();
/// let r1 = ResolutionContext::for_scope(&container, "r1", CancellationToken::new());
/// let r2 = ResolutionContext::for_scope(&container, "r2", CancellationToken::new());
///
/// // Singleton: same instance across scopes
/// let db1 = r1.get::<Database>(Lifetime::Singleton).unwrap();
/// let db2 = r2.get::<Database>(Lifetime::Singleton).unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Scoped: same within a scope, different across scopes
/// let repo1a = r1.get::<Repository>(Lifetime::Scoped).unwrap();
/// let repo1b = r1.get::<Repository>(Lifetime::Scoped).unwrap();
/// let repo2 = r2.get::<Repository>(Lifetime::Scoped).unwrap();
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
///
/// // Transient: always different
/// let t1 = r1.get::<Repository>(Lifetime::Transient).unwrap();
/// let t2 = r1.get::<Repository>(Lifetime::Transient).unwrap();
/// assert!(!Arc::ptr_eq(&t1, &t2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance in the application scope, shared by every request
    Singleton,
    /// One instance per request scope, shared within that request only
    Scoped,
    /// A fresh instance on every resolution, never stored in a scope
    Transient,
}

impl Lifetime {
    /// Whether instances of this lifetime live in the scope store.
    pub fn is_cached(self) -> bool {
        !matches!(self, Lifetime::Transient)
    }
}
