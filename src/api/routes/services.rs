//! Service fleet routes.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};
use crate::meeting::CoordinatorStatus;
use crate::service::ServiceStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub services: BTreeMap<String, ServiceStatus>,
    pub meeting: CoordinatorStatus,
    pub shutting_down: bool,
}

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/status", get(status))
        .route("/services", get(list_services))
        .route("/services/:name/restart", post(restart_service))
}

/// GET /status - Every service plus the meeting session.
async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusResponse>> {
    let orchestrator = state.orchestrator()?;
    Ok(Json(StatusResponse {
        services: orchestrator.get_status().await,
        meeting: state.coordinator.get_status().await,
        shutting_down: orchestrator.is_shutting_down(),
    }))
}

/// GET /services - Statuses in start order.
async fn list_services(State(state): State<ApiState>) -> ApiResult<Json<Vec<ServiceStatus>>> {
    Ok(Json(state.orchestrator()?.services().await))
}

/// POST /services/:name/restart
async fn restart_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceStatus>> {
    // Stopping the server waits for this very request.
    if name == crate::api::SERVICE_NAME {
        return Err(ApiError::conflict(
            "the API cannot restart itself; restart the agent instead",
        ));
    }

    info!("Restart of '{}' requested via API", name);
    let orchestrator = state.orchestrator()?;

    // Run detached so a dropped connection cannot abandon a half-done restart.
    let task = {
        let orchestrator = orchestrator.clone();
        let name = name.clone();
        tokio::spawn(async move { orchestrator.restart_service(&name).await })
    };
    task.await
        .map_err(|e| ApiError::internal(format!("restart task failed: {e}")))??;

    orchestrator
        .status(&name)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("service '{name}' not found")))
}
