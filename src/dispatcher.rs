//! Request dispatcher: one scope, one pipeline, one response per request.

use std::convert::Infallible;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::StatusCode;
use axum::response::IntoResponse;
use tower::Service;

use crate::ids::{SequenceIdGenerator, UniqueIdGenerator};
use crate::pipeline::{build_pipeline, call, Request, Response};
use crate::provider::{request_scope_id, Container, ResolutionContext, ScopeStore};
use crate::DiResult;

/// Deletes the request scope when dropped: on normal completion, on panic
/// unwinding through the request, and when the request future is dropped.
struct ScopeGuard<'a> {
    store: &'a ScopeStore,
    scope_id: String,
}

impl<'a> ScopeGuard<'a> {
    /// Creates the scope. A collision means the id generator handed out a
    /// live id twice, which the dispatcher cannot recover from.
    fn open(store: &'a ScopeStore, request_id: &str) -> Self {
        let scope_id = request_scope_id(request_id);
        if let Err(err) = store.create_scope(scope_id.clone()) {
            panic!("request id generator produced a live id: {}", err);
        }
        Self { store, scope_id }
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.store.delete_scope(&self.scope_id) {
            tracing::warn!(scope = %self.scope_id, error = %err, "request scope already gone");
        }
    }
}

/// Turns each incoming request into a fresh scope and pipeline.
///
/// Cloning is cheap; clones share the container and the id generator.
#[derive(Clone)]
pub struct RequestDispatcher {
    container: Container,
    ids: Arc<dyn UniqueIdGenerator>,
}

impl RequestDispatcher {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            ids: Arc::new(SequenceIdGenerator::new()),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn UniqueIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Builds prewarmed singletons.
    pub fn start(&self) -> DiResult<()> {
        self.container.prewarm()
    }

    /// Cancels outstanding requests and drops the application scope.
    pub fn shutdown(&self) -> DiResult<()> {
        self.container.shutdown()
    }

    /// Serves one request.
    ///
    /// A pipeline that fails to build, by error or by panic, is logged and
    /// answered with 500. The request scope is deleted on every exit path.
    pub async fn handle(&self, request: Request) -> Response {
        let request_id = self.ids.next_id();
        let _scope = ScopeGuard::open(self.container.store(), &request_id);

        let cancellation = self.container.cancellation().child_token();
        let _cancel_on_drop = cancellation.clone().drop_guard();
        let ctx = ResolutionContext::for_request(&self.container, &request_id, cancellation);

        let handler = match catch_unwind(AssertUnwindSafe(|| build_pipeline(&ctx))) {
            Ok(Ok(handler)) => handler,
            Ok(Err(err)) => {
                tracing::error!(request_id = %request_id, error = %err, "failed to build request pipeline");
                return internal_error();
            }
            Err(_) => {
                tracing::error!(request_id = %request_id, "builder panicked while building request pipeline");
                return internal_error();
            }
        };

        call(handler, request).await
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

impl Service<Request> for RequestDispatcher {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.handle(request).await) })
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("container", &self.container)
            .finish()
    }
}
