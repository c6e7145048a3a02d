//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type: the startup-time
//! registration API that tags every builder with the capability it satisfies.
//! Capabilities are declared explicitly at registration (`add_controller`,
//! `use_middleware`, `register::<dyn Trait, _, _>`), never discovered by
//! scanning types at request time.

use std::sync::Arc;

use crate::key::{Concrete, Key};
use crate::provider::{Container, ResolutionContext};
use crate::registration::{Ctor, Instance, Registration, Registry};
use crate::traits::{Controller, Logger, Middleware, Provides};
use crate::{DiError, DiResult};

pub mod module_system;
pub use module_system::*;

/// Default application name, used for the application scope identifier.
pub const DEFAULT_APPLICATION: &str = "scopeline";

/// Registration-time builder of a [`Container`].
///
/// Registration is startup-only: [`build`](Self::build) freezes the registry
/// and validates it.
pub struct ServiceCollection {
    registry: Registry,
    application: String,
    required: Vec<Key>,
    prewarm: Vec<Key>,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self::with_application(DEFAULT_APPLICATION)
    }

    /// Creates a collection whose application scope is named after `application`.
    pub fn with_application(application: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(),
            application: application.into(),
            required: Vec::new(),
            prewarm: Vec::new(),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    // ----- Capability Registrations -----

    /// Registers a builder for the concrete type `C` under the capability `T`.
    ///
    /// Multiple builders may share a capability; they are resolved in
    /// registration order by `get_all`, and the last one answers `get`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scopeline::{ServiceCollection, Provides, Lifetime, ResolutionContext};
    /// use std::sync::Arc;
    ///
    /// trait Plugin: Send + Sync { fn name(&self) -> &'static str; }
    /// struct Alpha;
    /// struct Beta;
    /// impl Plugin for Alpha { fn name(&self) -> &'static str { "alpha" } }
    /// impl Plugin for Beta { fn name(&self) -> &'static str { "beta" } }
    /// impl Provides<dyn Plugin> for Alpha { fn upcast(self: Arc<Self>) -> Arc<dyn Plugin> { self } }
    /// impl Provides<dyn Plugin> for Beta { fn upcast(self: Arc<Self>) -> Arc<dyn Plugin> { self } }
    ///
    /// let mut services = ServiceCollection::new();
    /// services
    ///     .register::<dyn Plugin, Alpha, _>(|_| Ok(Alpha))
    ///     .register::<dyn Plugin, Beta, _>(|_| Ok(Beta));
    ///
    /// let container = services.build().unwrap();
    /// let ctx = ResolutionContext::application(&container);
    /// let names: Vec<_> = ctx.get_all::<dyn Plugin>(Lifetime::Singleton).unwrap()
    ///     .iter().map(|p| p.name()).collect();
    /// assert_eq!(names, ["alpha", "beta"]);
    /// assert_eq!(ctx.get::<dyn Plugin>(Lifetime::Singleton).unwrap().name(), "beta");
    /// ```
    pub fn register<T, C, F>(&mut self, builder: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        C: Provides<T>,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        self.insert::<C>(Key::of::<T>(), capability_ctor::<T, C, F>(builder))
    }

    /// Registers a builder for `C` under the capability `T` and a name.
    pub fn register_named<T, C, F>(&mut self, name: &'static str, builder: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        C: Provides<T>,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        self.insert::<C>(Key::named::<T>(name), capability_ctor::<T, C, F>(builder))
    }

    /// Registers a concrete service resolved by its own type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scopeline::{ServiceCollection, Lifetime, ResolutionContext};
    ///
    /// struct Settings { retries: u32 }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_service(|_| Ok(Settings { retries: 3 }));
    ///
    /// let container = services.build().unwrap();
    /// let ctx = ResolutionContext::application(&container);
    /// assert_eq!(ctx.get::<Settings>(Lifetime::Transient).unwrap().retries, 3);
    /// ```
    pub fn add_service<C, F>(&mut self, builder: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolutionContext| -> DiResult<Instance> {
            let value: Arc<C> = Arc::new(builder(ctx)?);
            Ok(Arc::new(value) as Instance)
        });
        self.insert::<C>(Key::of::<C>(), ctor)
    }

    /// Registers a concrete service resolved by its own type and `name`.
    pub fn add_named_service<C, F>(&mut self, name: &'static str, builder: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolutionContext| -> DiResult<Instance> {
            let value: Arc<C> = Arc::new(builder(ctx)?);
            Ok(Arc::new(value) as Instance)
        });
        self.insert::<C>(Key::named::<C>(name), ctor)
    }

    /// Registers an already constructed value; every resolution returns it.
    pub fn add_instance<C: Send + Sync + 'static>(&mut self, value: C) -> &mut Self {
        self.add_shared(Arc::new(value))
    }

    /// Registers a shared value; every resolution returns a clone of the `Arc`.
    pub fn add_shared<C: Send + Sync + 'static>(&mut self, value: Arc<C>) -> &mut Self {
        let ctor: Ctor = Arc::new(move |_: &ResolutionContext| -> DiResult<Instance> {
            Ok(Arc::new(value.clone()) as Instance)
        });
        self.insert::<C>(Key::of::<C>(), ctor)
    }

    /// Registers a request handler for a path prefix.
    pub fn add_controller<C, F>(&mut self, builder: F) -> &mut Self
    where
        C: Controller,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        self.register::<dyn Controller, C, F>(builder)
    }

    /// Registers a middleware. The first one registered ends up outermost.
    pub fn use_middleware<M, F>(&mut self, builder: F) -> &mut Self
    where
        M: Middleware,
        F: Fn(&ResolutionContext) -> DiResult<M> + Send + Sync + 'static,
    {
        self.register::<dyn Middleware, M, F>(builder)
    }

    /// Registers the logger. A later registration replaces an earlier one.
    pub fn add_logger<L, F>(&mut self, builder: F) -> &mut Self
    where
        L: Logger,
        F: Fn(&ResolutionContext) -> DiResult<L> + Send + Sync + 'static,
    {
        self.register::<dyn Logger, L, F>(builder)
    }

    // ----- Validation and Startup -----

    /// Fails [`build`](Self::build) unless something is registered as `T`.
    pub fn require<T: ?Sized + 'static>(&mut self) -> &mut Self {
        self.required.push(Key::of::<T>());
        self
    }

    /// Builds every registration of `T` in the application scope at startup.
    pub fn prewarm<T: ?Sized + 'static>(&mut self) -> &mut Self {
        let key = Key::of::<T>();
        if !self.prewarm.contains(&key) {
            self.prewarm.push(key);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registry.contains_key(&Key::of::<T>())
    }

    /// Validates the registrations and freezes them into a [`Container`].
    ///
    /// # Errors
    ///
    /// - [`DiError::DuplicateRegistration`] if one concrete type is registered
    ///   twice under the same capability
    /// - [`DiError::MissingRequired`] if a [`require`](Self::require)d
    ///   capability has no registration
    pub fn build(self) -> DiResult<Container> {
        self.registry.check_duplicates()?;
        if let Some(missing) = self.required.iter().find(|k| !self.registry.contains_key(k)) {
            return Err(DiError::MissingRequired(missing.display_name()));
        }

        let container = Container::new(self.registry, &self.application, self.prewarm)?;
        container.inspect();
        Ok(container)
    }

    fn insert<C: 'static>(&mut self, key: Key, ctor: Ctor) -> &mut Self {
        self.registry.insert(key, Registration::new(Concrete::of::<C>(), ctor));
        self
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

fn capability_ctor<T, C, F>(builder: F) -> Ctor
where
    T: ?Sized + Send + Sync + 'static,
    C: Provides<T>,
    F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
{
    Arc::new(move |ctx: &ResolutionContext| -> DiResult<Instance> {
        let concrete = Arc::new(builder(ctx)?);
        let capability: Arc<T> = <C as Provides<T>>::upcast(concrete);
        Ok(Arc::new(capability) as Instance)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Lifetime;

    struct Clock;

    #[test]
    fn build_rejects_missing_required() {
        let mut services = ServiceCollection::new();
        services.require::<dyn Logger>();
        match services.build() {
            Err(err @ DiError::MissingRequired(_)) => assert!(err.is_configuration()),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn build_rejects_duplicate_concrete_types() {
        let mut services = ServiceCollection::new();
        services.add_service(|_| Ok(Clock));
        services.add_service(|_| Ok(Clock));
        assert!(matches!(
            services.build(),
            Err(DiError::DuplicateRegistration { .. })
        ));
    }

    #[test]
    fn instances_are_shared() {
        let mut services = ServiceCollection::new();
        services.add_instance(Clock);
        let container = services.build().unwrap();
        let ctx = ResolutionContext::application(&container);
        let a = ctx.get::<Clock>(Lifetime::Transient).unwrap();
        let b = ctx.get::<Clock>(Lifetime::Transient).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn application_name_drives_the_scope_id() {
        let container = ServiceCollection::with_application("billing").build().unwrap();
        assert_eq!(container.application_scope(), "scopeline:app:billing");
    }
}
