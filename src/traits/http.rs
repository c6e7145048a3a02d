use std::sync::Arc;

use super::Provides;
use crate::pipeline::Handler;

/// Serves one subtree of the URL space.
///
/// The routing table strips the prefix before delegating, so a controller
/// with prefix `"health"` sees `GET /health/` as `GET /`.
pub trait Controller: Send + Sync + 'static {
    /// Path prefix, with or without surrounding slashes.
    fn prefix(&self) -> &str;

    /// Handler for everything below the prefix.
    fn routes(&self) -> Handler;
}

/// Wraps a handler in cross-cutting behavior.
///
/// Middlewares registered first end up outermost: they run first on the way
/// in and last on the way out.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: Handler) -> Handler;
}

impl<C: Controller> Provides<dyn Controller> for C {
    fn upcast(self: Arc<Self>) -> Arc<dyn Controller> {
        self
    }
}

impl<M: Middleware> Provides<dyn Middleware> for M {
    fn upcast(self: Arc<Self>) -> Arc<dyn Middleware> {
        self
    }
}
