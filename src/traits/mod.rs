//! Capability contracts resolved by the container.

mod capability;
mod http;
mod logger;

pub use capability::Provides;
pub use http::{Controller, Middleware};
pub use logger::{field, Field, Logger};
