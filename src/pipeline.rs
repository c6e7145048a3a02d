//! Per-request pipeline: routing table plus middleware composition.
//!
//! For every request the dispatcher resolves all controllers and middlewares
//! in the request scope, mounts the controllers on a fresh [`RoutingTable`],
//! and wraps it with the middlewares in reverse registration order so the
//! first-registered middleware is outermost.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::extract::OriginalUri;
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tower::util::BoxCloneService;
use tower::{service_fn, Service, ServiceExt};

use crate::provider::ResolutionContext;
use crate::traits::{Controller, Middleware};
use crate::{DiResult, Lifetime};

pub type Request = axum::extract::Request;
pub type Response = axum::response::Response;

/// A composed, cloneable request handler.
pub type Handler = BoxCloneService<Request, Response, Infallible>;

/// Turns an async function into a [`Handler`].
///
/// # Examples
///
/// ```
/// use scopeline::pipeline::{handler_fn, call, Request};
/// use axum::response::IntoResponse;
///
/// # async fn example() {
/// let hello = handler_fn(|_req: Request| async { "hello".into_response() });
/// let response = call(hello, Request::default()).await;
/// assert_eq!(response.status(), 200);
/// # }
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    BoxCloneService::new(service_fn(move |request: Request| {
        let response = f(request);
        async move { Ok::<_, Infallible>(response.await) }
    }))
}

/// Boxes any infallible tower service, such as an axum `Router`, into a [`Handler`].
pub fn into_handler<S>(service: S) -> Handler
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    BoxCloneService::new(service)
}

/// Drives one request through a handler.
pub async fn call(handler: Handler, request: Request) -> Response {
    match handler.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Trims leading and trailing separators from a controller prefix.
pub fn normalize_prefix(prefix: &str) -> &str {
    prefix.trim_matches('/')
}

#[derive(Clone)]
struct Route {
    prefix: String,
    handler: Handler,
}

impl Route {
    /// Path below the prefix if `path` falls inside this route's subtree.
    fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.prefix.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix('/')?.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

/// Maps path prefixes to controller handlers.
///
/// The longest matching prefix wins; overlapping prefixes are not rejected.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `handler` under `prefix`. The prefix is stripped before delegation.
    pub fn mount(&mut self, prefix: &str, handler: Handler) -> &mut Self {
        self.routes.push(Route {
            prefix: normalize_prefix(prefix).to_string(),
            handler,
        });
        self
    }

    /// Mounts every controller under its own prefix.
    pub fn mount_all(&mut self, controllers: &[Arc<dyn Controller>]) -> &mut Self {
        for controller in controllers {
            self.mount(controller.prefix(), controller.routes());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.prefix.as_str())
    }

    fn find(&self, path: &str) -> Option<(&Route, String)> {
        self.routes
            .iter()
            .filter_map(|route| route.strip(path).map(|rest| (route, rest.to_string())))
            .max_by_key(|(route, _)| route.prefix.len())
    }

    /// Picks the controller for `request` and rewrites its URI below the prefix.
    ///
    /// Returns the ready response instead when nothing matches.
    pub fn route(&self, mut request: Request) -> Result<(Handler, Request), Response> {
        let Some((route, rest)) = self.find(request.uri().path()) else {
            return Err((StatusCode::NOT_FOUND, "404 page not found").into_response());
        };

        let original = request.uri().clone();
        let Some(stripped) = strip_uri(&original, &rest) else {
            return Err((StatusCode::BAD_REQUEST, "invalid request path").into_response());
        };
        if request.extensions().get::<OriginalUri>().is_none() {
            request.extensions_mut().insert(OriginalUri(original));
        }
        *request.uri_mut() = stripped;

        Ok((route.handler.clone(), request))
    }

    /// Dispatches one request to the matching controller, or answers 404.
    ///
    /// The returned future owns everything it needs and does not borrow the table.
    pub fn dispatch(&self, request: Request) -> impl Future<Output = Response> + Send + 'static {
        let routed = self.route(request);
        async move {
            match routed {
                Ok((handler, request)) => call(handler, request).await,
                Err(response) => response,
            }
        }
    }

    pub fn into_handler(self) -> Handler {
        handler_fn(move |request: Request| self.dispatch(request))
    }
}

fn strip_uri(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

/// Wraps `inner` with `middlewares`, last-registered innermost.
///
/// Given `[m1, m2, m3]` the result is `m1(m2(m3(inner)))`: `m1` runs first on
/// the way in and last on the way out.
pub fn compose(inner: Handler, middlewares: &[Arc<dyn Middleware>]) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(inner, |next, middleware| middleware.wrap(next))
}

/// Builds the complete handler for the request bound to `ctx`.
///
/// Controllers and middlewares are resolved with the Scoped lifetime, so each
/// request gets its own instances. Any resolution failure aborts the build.
pub fn build_pipeline(ctx: &ResolutionContext) -> DiResult<Handler> {
    let controllers = ctx.get_all::<dyn Controller>(Lifetime::Scoped)?;
    let mut table = RoutingTable::new();
    table.mount_all(&controllers);

    let middlewares = ctx.get_all::<dyn Middleware>(Lifetime::Scoped)?;
    Ok(compose(table.into_handler(), &middlewares))
}
