//! Platform routes.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::meeting::Platform;

#[derive(Debug, Deserialize)]
pub struct ClassifyParams {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Classification {
    pub url: String,
    /// `None` when no platform recognises the link
    pub platform: Option<Platform>,
}

pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/", get(list_platforms))
        .route("/classify", get(classify))
}

/// GET /platforms - Platforms with a loaded provider, in preference order.
async fn list_platforms(State(state): State<ApiState>) -> Json<Vec<Platform>> {
    Json(state.coordinator.available_platforms().await)
}

/// GET /platforms/classify?url=
async fn classify(
    State(state): State<ApiState>,
    Query(params): Query<ClassifyParams>,
) -> Json<Classification> {
    let platform = state.coordinator.classify(&params.url);
    Json(Classification {
        url: params.url,
        platform,
    })
}
