//! Handlers for finished-job history.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use easel_core::error::CoreError;
use easel_core::types::JobId;

use crate::error::AppResult;
use crate::handlers::queue::AdminRequest;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for GET /history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub max_items: Option<usize>,
}

/// GET /api/v1/history?max_items=
///
/// Finished jobs, oldest first. Falls back to the configured history
/// limit when the request names none.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query.max_items.or(state.config.history_limit);
    let entries = state.queue.history(limit).await;
    Ok(Json(DataResponse { data: entries }))
}

/// GET /api/v1/history/{id}
pub async fn get_history_detail(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let entry = state
        .queue
        .history_detail(job_id)
        .await
        .ok_or_else(|| CoreError::job_not_found(job_id))?;
    Ok(Json(DataResponse { data: entry.view() }))
}

/// POST /api/v1/history
///
/// Admin operations: `{"clear": true}` and/or `{"delete": [ids]}`.
pub async fn post_history(
    State(state): State<AppState>,
    Json(input): Json<AdminRequest>,
) -> AppResult<impl IntoResponse> {
    let removed = state.queue.remove_history_items(&input.delete).await;
    let cleared = if input.clear {
        state.queue.clear_history().await
    } else {
        0
    };
    tracing::info!(cleared, removed, "History admin operation");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "cleared": cleared, "removed": removed }),
    }))
}
