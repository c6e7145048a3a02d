//! Service module system for modular registration.

use crate::{DiResult, ServiceCollection};

/// A bundle of registrations applied to a [`ServiceCollection`] in one call.
///
/// # Example
///
/// ```rust
/// use scopeline::{ServiceCollection, ServiceModule, ServiceCollectionExt, DiResult, Lifetime};
///
/// struct Settings;
/// struct SettingsModule;
///
/// impl ServiceModule for SettingsModule {
///     fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
///         services.add_service(|_| Ok(Settings));
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_module(SettingsModule)?;
/// assert!(services.contains::<Settings>());
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Register this module's services with the ServiceCollection.
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()>;
}

/// Module registration with the collection's `&mut Self` chaining.
pub trait ServiceCollectionExt {
    fn add_module<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self>;
}

impl ServiceCollectionExt for ServiceCollection {
    fn add_module<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }
}
