//! # scopeline
//!
//! Lifetime-scoped dependency injection for HTTP services. Every request gets
//! its own scope and its own pipeline of controllers and middlewares, built
//! from registrations made once at startup.
//!
//! ## Features
//!
//! - **Lifetime at the call site**: Singleton, Scoped, or Transient is chosen when resolving
//! - **Capabilities**: several builders per trait, resolved together in registration order
//! - **Build once**: concurrent first access to a cache slot runs its builder exactly once
//! - **Circular dependency detection**: cycles fail with the full resolution path
//! - **Per-request pipeline**: controllers mounted by prefix, middlewares wrapped first-outermost
//! - **Guaranteed cleanup**: a request scope is deleted however the request ends
//!
//! ## Quick Start
//!
//! ```rust
//! use scopeline::{ServiceCollection, Lifetime, ResolutionContext};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_service(|_| Ok(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! }));
//! services.add_service(|ctx| Ok(UserService {
//!     db: ctx.get::<Database>(Lifetime::Singleton)?,
//! }));
//!
//! let container = services.build().unwrap();
//! let ctx = ResolutionContext::application(&container);
//! let users = ctx.get::<UserService>(Lifetime::Transient).unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Serving HTTP
//!
//! ```rust,no_run
//! use scopeline::{App, Controller, Handler, DiResult, ResolutionContext};
//! use scopeline::pipeline::into_handler;
//! use axum::{routing::get, Router};
//!
//! struct Hello;
//!
//! impl Controller for Hello {
//!     fn prefix(&self) -> &str { "hello" }
//!     fn routes(&self) -> Handler {
//!         into_handler(Router::new().route("/", get(|| async { "hello" })))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::from_settings(Default::default())?.with_defaults()?;
//!     app.add_controller(|_: &ResolutionContext| -> DiResult<Hello> { Ok(Hello) });
//!     app.run().await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod builtin;
pub mod cancellation;
pub mod collection;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod key;
pub mod lifetime;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;
mod registration;

pub use app::{App, AppError};
pub use cancellation::{CancelOnDrop, CancellationToken};
pub use collection::{ServiceCollection, ServiceCollectionExt, ServiceModule};
pub use config::{AppConfig, Config, ConfigError, Settings};
pub use dispatcher::RequestDispatcher;
pub use error::{DiError, DiResult};
pub use ids::{SequenceIdGenerator, UniqueIdGenerator, UuidIdGenerator};
pub use key::{Concrete, Key, SlotKey};
pub use lifetime::Lifetime;
pub use logging::{NullLogger, TracingLogger};
pub use pipeline::Handler;
pub use provider::{application_scope_id, request_scope_id, Container, ResolutionContext, ScopeStore};
pub use registration::Instance;
pub use traits::{field, Controller, Field, Logger, Middleware, Provides};
