//! API route modules.

pub mod logs;
pub mod meeting;
pub mod platforms;
pub mod services;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::{Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tower::ServiceBuilder;
use tracing::debug;

use super::error::{ApiError, ApiResult};
use crate::meeting::MeetingCoordinator;
use crate::service::Orchestrator;

/// Shared state for every route.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Weak<Orchestrator>,
    pub coordinator: Arc<MeetingCoordinator>,
}

impl ApiState {
    pub fn orchestrator(&self) -> ApiResult<Arc<Orchestrator>> {
        self.orchestrator
            .upgrade()
            .ok_or_else(|| ApiError::unavailable("agent is shutting down"))
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(info))
        .merge(services::router())
        .nest("/meeting", meeting::router())
        .nest("/platforms", platforms::router())
        .nest("/logs", logs::router())
        .layer(ServiceBuilder::new().layer(middleware::from_fn(trace_request)))
        .with_state(state)
}

async fn info() -> Json<Value> {
    Json(json!({
        "service": "roomkeeper",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn trace_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    debug!("{} {} -> {}", method, path, response.status().as_u16());
    response
}
