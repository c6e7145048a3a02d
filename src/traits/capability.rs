use std::sync::Arc;

/// Declares that a concrete type satisfies the capability `T`.
///
/// Registration under a capability requires this bound, so registering a type
/// that lacks the capability's behavior is rejected at compile time. The
/// built-in capabilities (`dyn Controller`, `dyn Middleware`, `dyn Logger`,
/// `dyn Cache`) have blanket implementations; user-declared capabilities
/// implement it once per concrete type.
///
/// # Examples
///
/// ```
/// use scopeline::{Provides, ServiceCollection, Lifetime, ResolutionContext};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
/// impl Provides<dyn Greeter> for English {
///     fn upcast(self: Arc<Self>) -> Arc<dyn Greeter> { self }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.register::<dyn Greeter, English, _>(|_| Ok(English));
/// let container = services.build().unwrap();
///
/// let ctx = ResolutionContext::application(&container);
/// let greeter = ctx.get::<dyn Greeter>(Lifetime::Singleton).unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
pub trait Provides<T: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<T>;
}
