//! A controller backed by a request-scoped service and a singleton cache.
//!
//! ```text
//! cargo run --example services
//! curl localhost:8080/greet/ada
//! ```

use std::sync::Arc;

use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use serde_json::json;

use scopeline::builtin::{Cache, MemoryCache, TimeoutMiddleware};
use scopeline::pipeline::into_handler;
use scopeline::{
    App, Controller, DiResult, Handler, Lifetime, Logger, Provides, ResolutionContext, Settings,
};

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

struct CountingGreeter {
    logger: Arc<dyn Logger>,
    cache: Arc<dyn Cache>,
}

impl CountingGreeter {
    fn new(ctx: &ResolutionContext) -> DiResult<Self> {
        Ok(Self {
            logger: ctx.logger_for::<Self>(Lifetime::Scoped)?,
            cache: ctx.get::<dyn Cache>(Lifetime::Singleton)?,
        })
    }
}

impl Greeter for CountingGreeter {
    fn greet(&self, name: &str) -> String {
        let key = format!("greetings:{}", name);
        let count = self.cache.get(&key).and_then(|v| v.as_u64()).unwrap_or(0) + 1;
        self.cache.set(&key, json!(count));
        self.logger.info("greeting", &[scopeline::field("name", name)]);
        format!("hello {} (#{})", name, count)
    }
}

impl Provides<dyn Greeter> for CountingGreeter {
    fn upcast(self: Arc<Self>) -> Arc<dyn Greeter> {
        self
    }
}

struct GreetController {
    greeter: Arc<dyn Greeter>,
}

impl GreetController {
    fn new(ctx: &ResolutionContext) -> DiResult<Self> {
        Ok(Self {
            greeter: ctx.get::<dyn Greeter>(Lifetime::Scoped)?,
        })
    }
}

impl Controller for GreetController {
    fn prefix(&self) -> &str {
        "/greet"
    }

    fn routes(&self) -> Handler {
        let greeter = self.greeter.clone();
        into_handler(Router::new().route(
            "/:name",
            get(move |Path(name): Path<String>| {
                let greeter = greeter.clone();
                async move { greeter.greet(&name) }
            }),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::from_settings(Settings::default())?.with_defaults()?;
    app.use_middleware(TimeoutMiddleware::new)
        .register::<dyn Cache, MemoryCache, _>(MemoryCache::new)
        .register::<dyn Greeter, CountingGreeter, _>(CountingGreeter::new)
        .add_controller(GreetController::new);
    app.services().prewarm::<dyn Cache>();
    app.run().await?;
    Ok(())
}
