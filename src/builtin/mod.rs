//! Ready-made controllers, middlewares and services.

mod cache;
mod health;
mod middleware;

pub use cache::{Cache, MemoryCache};
pub use health::HealthController;
pub use middleware::{LogMiddleware, RecoverMiddleware, TimeoutMiddleware};

use crate::logging::TracingLogger;
use crate::{DiResult, ServiceCollection, ServiceModule};

/// The standard set: tracing logger, request logging, `/health`, and panic
/// recovery, in that order.
///
/// Request logging is registered before recovery, so it sits outside it and
/// records the 500 produced by a recovered panic.
#[derive(Debug, Default, Clone, Copy)]
pub struct Defaults;

impl ServiceModule for Defaults {
    fn register_services(self, services: &mut ServiceCollection) -> DiResult<()> {
        services
            .add_logger(TracingLogger::from_context)
            .use_middleware(LogMiddleware::new)
            .add_controller(HealthController::new)
            .use_middleware(RecoverMiddleware::new);
        Ok(())
    }
}
