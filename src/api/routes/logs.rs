use crate::api::error::{ApiError, ApiResult};
use crate::logs::{tail_journal, JournalQuery, JournalTail};
use axum::{extract::Query, response::Json, routing::get, Router};
use serde::Deserialize;

use super::ApiState;

#[derive(Debug, Deserialize, Default)]
pub struct LogsParams {
    /// Defaults to 30.
    pub lines: Option<usize>,
    pub grep: Option<String>,
}

pub fn router() -> Router<ApiState> {
    Router::new().route("/", get(get_logs))
}

/// GET /logs?lines=&grep=
async fn get_logs(Query(params): Query<LogsParams>) -> ApiResult<Json<JournalTail>> {
    let mut query = JournalQuery::new(params.lines.unwrap_or(30));
    if let Some(pattern) = params.grep {
        query = query.matching(pattern);
    }
    let tail = tokio::task::spawn_blocking(move || tail_journal(&query))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(ApiError::from)?;
    Ok(Json(tail))
}
