//! Handlers for queue inspection and administration.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use easel_core::types::JobId;
use easel_queue::CancelOutcome;

use crate::engine::broadcast_status;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /queue and POST /history.
#[derive(Debug, Default, Deserialize)]
pub struct AdminRequest {
    /// Drop everything.
    #[serde(default)]
    pub clear: bool,
    /// Specific job ids to drop.
    #[serde(default)]
    pub delete: Vec<JobId>,
}

/// Response for POST /queue.
#[derive(Debug, Serialize)]
pub struct QueueAdminResponse {
    pub cleared: usize,
    pub removed: usize,
    /// Running jobs whose interruption flag was set.
    pub interrupt_requested: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/queue
///
/// Running job plus pending jobs in dequeue order.
pub async fn get_queue(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let snapshot = state.queue.queue_snapshot().await;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/v1/queue
///
/// Admin operations: `{"clear": true}` drops all pending jobs;
/// `{"delete": [ids]}` cancels specific ones (pending jobs move to
/// history as interrupted, a running job gets its interruption flag).
pub async fn post_queue(
    State(state): State<AppState>,
    Json(input): Json<AdminRequest>,
) -> AppResult<impl IntoResponse> {
    let mut removed = 0;
    let mut interrupt_requested = 0;
    for id in &input.delete {
        match state.queue.cancel(*id).await {
            CancelOutcome::RemovedPending => removed += 1,
            CancelOutcome::InterruptRequested => interrupt_requested += 1,
            CancelOutcome::NotFound => {
                tracing::debug!(job_id = %id, "Delete requested for unknown job");
            }
        }
    }
    let cleared = if input.clear {
        state.queue.clear_pending().await
    } else {
        0
    };

    broadcast_status(&state).await;
    tracing::info!(cleared, removed, interrupt_requested, "Queue admin operation");
    Ok(Json(DataResponse {
        data: QueueAdminResponse {
            cleared,
            removed,
            interrupt_requested,
        },
    }))
}

/// POST /api/v1/interrupt
///
/// Request cooperative interruption of whatever job is running.
pub async fn post_interrupt(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let interrupted = state.queue.interrupt_running().await;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "interrupted": interrupted }),
    }))
}
