//! Error types for the resolution engine and request pipeline.

use thiserror::Error;

/// Dependency injection errors
///
/// Covers the three classes of failure the container can produce:
///
/// - **Configuration errors** surface from [`ServiceCollection::build`](crate::ServiceCollection::build)
///   and mean the application must not start serving.
/// - **Resolution errors** surface while a request pipeline is being built; the
///   dispatcher answers that single request with a 500.
/// - **Scope misuse** means the dispatcher broke its own scope lifecycle
///   invariant (double create, use after delete).
///
/// # Examples
///
/// ```rust
/// use scopeline::{DiError, ServiceCollection, Lifetime, ResolutionContext};
///
/// let container = ServiceCollection::new().build().unwrap();
/// let ctx = ResolutionContext::application(&container);
/// match ctx.get::<String>(Lifetime::Transient) {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No builder registered for the capability
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Invalid lifetime resolution (e.g. scoped outside of a request)
    #[error("Lifetime error: {0}")]
    WrongLifetime(&'static str),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// The same concrete type was registered twice under one capability
    #[error("{concrete} registered more than once as {capability}")]
    DuplicateRegistration {
        capability: &'static str,
        concrete: &'static str,
    },
    /// A capability marked as required has no registration
    #[error("Required service not registered: {0}")]
    MissingRequired(&'static str),
    /// `create_scope` called twice for the same identifier
    #[error("Scope already exists: {0}")]
    ScopeExists(String),
    /// The scope was never created or has already been removed
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),
    /// The scope was deleted while a build for it was in flight
    #[error("Scope deleted during resolution: {0}")]
    ScopeDeleted(String),
    /// A builder reported a failure of its own
    #[error("Failed to build {service}: {message}")]
    Build {
        service: &'static str,
        message: String,
    },
    /// The resolution context was cancelled before the build ran
    #[error("Resolution cancelled")]
    Cancelled,
}

impl DiError {
    /// Wraps a builder failure for the service `S`.
    pub fn build<S: ?Sized + 'static>(message: impl std::fmt::Display) -> Self {
        DiError::Build {
            service: std::any::type_name::<S>(),
            message: message.to_string(),
        }
    }

    /// Errors that should stop the process before it starts serving.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DiError::DuplicateRegistration { .. } | DiError::MissingRequired(_)
        )
    }

    /// Errors that indicate a broken scope lifecycle in the caller.
    pub fn is_scope_misuse(&self) -> bool {
        matches!(
            self,
            DiError::ScopeExists(_) | DiError::ScopeNotFound(_) | DiError::ScopeDeleted(_)
        )
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
