use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ConnectInfo;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use futures_util::FutureExt;

use crate::config::Settings;
use crate::key::Key;
use crate::logging::fields;
use crate::pipeline::{call, handler_fn, Handler, Request};
use crate::traits::{field, Field, Logger, Middleware};
use crate::{DiResult, Lifetime, ResolutionContext};

/// Logs `request received` and `request finished` around every request.
pub struct LogMiddleware {
    logger: Arc<dyn Logger>,
}

impl LogMiddleware {
    pub fn new(ctx: &ResolutionContext) -> DiResult<Self> {
        Ok(Self {
            logger: ctx.logger_for::<Self>(Lifetime::Scoped)?,
        })
    }
}

impl Middleware for LogMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        let logger = self.logger.clone();
        handler_fn(move |request: Request| {
            let next = next.clone();
            let started = Instant::now();
            let group = logger.with_group(fields::HTTP).with(request_fields(&request));
            async move {
                group.info("request received", &[]);
                let response = call(next, request).await;
                group.info(
                    "request finished",
                    &[
                        field(fields::STATUS, response.status().as_u16()),
                        field(fields::DURATION, format!("{:?}", started.elapsed())),
                    ],
                );
                response
            }
        })
    }
}

fn request_fields(request: &Request) -> Vec<Field> {
    let header_value = |name: header::HeaderName| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_default();

    vec![
        field(fields::METHOD, request.method()),
        field(fields::HOST, header_value(header::HOST)),
        field(fields::URL, request.uri()),
        field(fields::REMOTE, remote),
        field(fields::AGENT, header_value(header::USER_AGENT)),
    ]
}

/// Turns a panic anywhere inside it into a 500 response with body
/// `panic: <message>`.
///
/// With [`Settings::debug`] the body also names the request that failed.
pub struct RecoverMiddleware {
    logger: Arc<dyn Logger>,
    debug: bool,
}

impl RecoverMiddleware {
    pub fn new(ctx: &ResolutionContext) -> DiResult<Self> {
        let debug = if ctx.container().is_registered(&Key::of::<Settings>()) {
            ctx.get::<Settings>(Lifetime::Singleton)?.debug
        } else {
            false
        };
        Ok(Self {
            logger: ctx.logger_for::<Self>(Lifetime::Scoped)?,
            debug,
        })
    }
}

impl Middleware for RecoverMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        let logger = self.logger.clone();
        let debug = self.debug;
        handler_fn(move |request: Request| {
            let next = next.clone();
            let logger = logger.clone();
            let line = format!("{} {}", request.method(), request.uri());
            async move {
                match AssertUnwindSafe(call(next, request)).catch_unwind().await {
                    Ok(response) => response,
                    Err(payload) => {
                        let mut message = format!("panic: {}", panic_message(payload.as_ref()));
                        if debug {
                            message.push_str(&format!("\n\nwhile serving {}", line));
                        }
                        logger.error(&message, &[]);
                        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
                    }
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// Answers `503 Timeout` when the rest of the pipeline takes too long.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    pub timeout: Duration,
}

impl TimeoutMiddleware {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(_: &ResolutionContext) -> DiResult<Self> {
        Ok(Self::with_timeout(Self::DEFAULT_TIMEOUT))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Middleware for TimeoutMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        let timeout = self.timeout;
        handler_fn(move |request: Request| {
            let next = next.clone();
            async move {
                match tokio::time::timeout(timeout, call(next, request)).await {
                    Ok(response) => response,
                    Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "Timeout").into_response(),
                }
            }
        })
    }
}
