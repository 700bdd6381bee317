//! Meeting session routes.

use axum::{extract::State, response::Json, routing::get, routing::post, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};
use crate::meeting::{CoordinatorStatus, JoinOptions, MeetingInfo};

/// Body of POST /meeting/join. Unset options use the room defaults.
#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub url: String,
    #[serde(flatten)]
    pub options: JoinOptions,
}

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/", get(meeting_status))
        .route("/join", post(join_meeting))
        .route("/leave", post(leave_meeting))
        .route("/camera", post(toggle_camera))
        .route("/mute", post(toggle_mute))
}

async fn meeting_status(State(state): State<ApiState>) -> Json<CoordinatorStatus> {
    Json(state.coordinator.get_status().await)
}

async fn join_meeting(
    State(state): State<ApiState>,
    Json(body): Json<JoinBody>,
) -> ApiResult<Json<MeetingInfo>> {
    if body.url.trim().is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    info!("Join requested via API: {}", body.url);

    // Joins run detached so a dropped connection cannot strand a provider
    // halfway through its session flow.
    let coordinator = state.coordinator.clone();
    let info = tokio::spawn(async move {
        coordinator.join_meeting(&body.url, body.options).await
    })
    .await
    .map_err(|e| ApiError::internal(format!("join task failed: {e}")))??;

    Ok(Json(info))
}

async fn leave_meeting(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    info!("Leave requested via API");
    let coordinator = state.coordinator.clone();
    tokio::spawn(async move { coordinator.leave_meeting().await })
        .await
        .map_err(|e| ApiError::internal(format!("leave task failed: {e}")))??;

    Ok(Json(json!({
        "success": true,
        "state": state.coordinator.state().await,
    })))
}

async fn toggle_camera(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let camera_on = state.coordinator.toggle_camera().await?;
    Ok(Json(json!({ "camera_on": camera_on })))
}

async fn toggle_mute(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let muted = state.coordinator.toggle_mute().await?;
    Ok(Json(json!({ "muted": muted })))
}
