use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use crate::pipeline::{into_handler, Handler};
use crate::traits::Controller;
use crate::{DiResult, ResolutionContext};

/// Liveness probe: `GET /health` answers `200 OK`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthController;

impl HealthController {
    pub fn new(_: &ResolutionContext) -> DiResult<Self> {
        Ok(Self)
    }
}

impl Controller for HealthController {
    fn prefix(&self) -> &str {
        "health"
    }

    fn routes(&self) -> Handler {
        into_handler(Router::new().route("/", get(|| async { (StatusCode::OK, "OK") })))
    }
}
