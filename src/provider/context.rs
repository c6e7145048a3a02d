//! Resolution context passed to every builder.

use std::sync::Arc;

use super::{request_scope_id, Container};
use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::key::Key;
use crate::logging::fields;
use crate::registration::Instance;
use crate::traits::{field, Logger};
use crate::{DiError, DiResult, Lifetime};

/// Ambient data for one pipeline build: which request (if any) is being
/// served, its cancellation signal, and the container to resolve against.
///
/// Builders receive it by reference and use it to resolve their own
/// dependencies; the context decides which scope a Scoped resolution binds
/// to. Cloning is cheap.
///
/// # Examples
///
/// ```
/// use scopeline::{ServiceCollection, Lifetime, ResolutionContext, CancellationToken};
/// use std::sync::Arc;
///
/// struct Database;
/// struct UserService { db: Arc<Database> }
///
/// let mut services = ServiceCollection::new();
/// services.add_service(|_| Ok(Database));
/// services.add_service(|ctx| Ok(UserService {
///     db: ctx.get::<Database>(Lifetime::Singleton)?,
/// }));
///
/// let container = services.build().unwrap();
/// container.store().create_scope(scopeline::request_scope_id("1")).unwrap();
/// let ctx = ResolutionContext::for_request(&container, "1", CancellationToken::new());
///
/// assert_eq!(ctx.request_id(), Some("1"));
/// let users = ctx.get::<UserService>(Lifetime::Scoped).unwrap();
/// let again = ctx.get::<UserService>(Lifetime::Scoped).unwrap();
/// assert!(Arc::ptr_eq(&users, &again));
/// ```
#[derive(Clone)]
pub struct ResolutionContext {
    container: Container,
    request_id: Option<Arc<str>>,
    scope_id: Option<Arc<str>>,
    cancellation: CancellationToken,
}

impl ResolutionContext {
    /// Context with no request scope, for startup work and singletons.
    pub fn application(container: &Container) -> Self {
        Self {
            container: container.clone(),
            request_id: None,
            scope_id: None,
            cancellation: container.cancellation().clone(),
        }
    }

    /// Context bound to the request scope of `request_id`.
    pub fn for_request(container: &Container, request_id: &str, cancellation: CancellationToken) -> Self {
        Self {
            container: container.clone(),
            request_id: Some(Arc::from(request_id)),
            scope_id: Some(Arc::from(request_scope_id(request_id))),
            cancellation,
        }
    }

    /// Context bound to an arbitrary scope, with no request identifier.
    pub fn for_scope(container: &Container, scope_id: &str, cancellation: CancellationToken) -> Self {
        Self {
            container: container.clone(),
            request_id: None,
            scope_id: Some(Arc::from(scope_id)),
            cancellation,
        }
    }

    /// Same container, without the request scope or the request's cancellation.
    pub(crate) fn detached(&self) -> Self {
        Self::application(&self.container)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn resolve(&self, key: &Key, lifetime: Lifetime) -> DiResult<Instance> {
        self.container.resolve(key, lifetime, self)
    }

    pub fn resolve_all(&self, key: &Key, lifetime: Lifetime) -> DiResult<Vec<Instance>> {
        self.container.resolve_all(key, lifetime, self)
    }

    /// Resolves the capability `T` (a trait object or a concrete service type).
    pub fn get<T>(&self, lifetime: Lifetime) -> DiResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        downcast::<T>(self.resolve(&Key::of::<T>(), lifetime)?)
    }

    /// Resolves the capability `T` registered under `name`.
    pub fn get_named<T>(&self, name: &'static str, lifetime: Lifetime) -> DiResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        downcast::<T>(self.resolve(&Key::named::<T>(name), lifetime)?)
    }

    /// Resolves every registration of `T`, in registration order.
    pub fn get_all<T>(&self, lifetime: Lifetime) -> DiResult<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_all(&Key::of::<T>(), lifetime)?
            .into_iter()
            .map(downcast::<T>)
            .collect()
    }

    /// Resolves the typed configuration `Config<T>` as a singleton.
    pub fn config<T>(&self) -> DiResult<Arc<Config<T>>>
    where
        T: Send + Sync + 'static,
    {
        self.get::<Config<T>>(Lifetime::Singleton)
    }

    /// Resolves the logger and tags it with the service `S`, plus the request
    /// identifier when resolved per request.
    pub fn logger_for<S: ?Sized + 'static>(&self, lifetime: Lifetime) -> DiResult<Arc<dyn Logger>> {
        let logger = self.get::<dyn Logger>(lifetime)?;
        let mut tags = vec![field(fields::SERVICE, std::any::type_name::<S>())];
        if let (Lifetime::Scoped, Some(id)) = (lifetime, self.request_id()) {
            tags.push(field(fields::REQUEST_ID, id));
        }
        Ok(logger.with(tags))
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("request_id", &self.request_id)
            .field("scope_id", &self.scope_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

fn downcast<T>(instance: Instance) -> DiResult<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}
