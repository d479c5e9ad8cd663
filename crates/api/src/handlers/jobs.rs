//! Handlers for job submission, status lookup, and one-shot results.

use std::collections::BTreeMap;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use serde::Serialize;
use serde_json::json;

use easel_core::assets::Bucket;
use easel_core::error::CoreError;
use easel_core::graph::NodeId;
use easel_core::types::JobId;
use easel_queue::{JobMetadata, JobTermination};
use easel_styles::materialize;

use crate::engine::broadcast_status;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response for POST /jobs.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    /// Queue number assigned at submission. It doubles as the job's
    /// priority, so front-of-queue submissions report a negative value.
    pub number: i64,
    pub node_errors: BTreeMap<NodeId, Vec<String>>,
}

/// Collected multipart fields of a submission.
#[derive(Default)]
struct SubmitFields {
    filename: Option<String>,
    image: Option<Vec<u8>>,
    style: Option<String>,
    prompt: Option<String>,
    client_id: Option<String>,
    front: bool,
}

async fn read_submit_fields(mut multipart: Multipart) -> AppResult<SubmitFields> {
    let mut fields = SubmitFields::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                fields.filename = field.file_name().map(str::to_string);
                fields.image = Some(field.bytes().await?.to_vec());
            }
            Some("style") => fields.style = Some(field.text().await?),
            Some("prompt") => fields.prompt = Some(field.text().await?),
            Some("client_id") => fields.client_id = Some(field.text().await?),
            Some("front") => {
                let value = field.text().await?;
                fields.front = matches!(value.as_str(), "1" | "true");
            }
            _ => {}
        }
    }
    Ok(fields)
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Multipart submission: `image` (required file), `style`, `prompt`,
/// `client_id`, `front`. Stores the upload, materializes the style's
/// graph template around it, validates against the engine, and
/// enqueues. Nothing is enqueued when validation fails.
pub async fn submit_job(State(state): State<AppState>, multipart: Multipart) -> AppResult<Response> {
    let fields = read_submit_fields(multipart).await?;
    let image = fields
        .image
        .ok_or_else(|| CoreError::Validation("Missing 'image' field".to_string()))?;
    let filename = fields.filename.unwrap_or_else(|| "upload.png".to_string());

    let stored = state
        .store
        .store(Bucket::Input, "", &filename, &image, false)
        .await?;

    let graph = {
        let catalog = state.styles.read().await;
        let template = catalog.resolve(fields.style.as_deref().unwrap_or(""));
        materialize(template, &stored.filename, fields.prompt.as_deref())?
    };

    let validation = state.executor.validate(&graph).await;
    if !validation.ok {
        // The stored upload is orphaned on purpose; result fetch and
        // asset removal are the cleanup paths.
        let body = json!({
            "error": validation.error.unwrap_or_else(|| "Validation failed".to_string()),
            "code": "VALIDATION_ERROR",
            "node_errors": validation.node_errors,
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    // Front-of-queue jobs get a negated number; the negative value is
    // both the priority and the number reported back.
    let number = state.next_number();
    let number = if fields.front { -number } else { number };
    let metadata = JobMetadata {
        session_id: fields.client_id.clone(),
        input_asset: Some(stored),
    };
    let job_id = state
        .queue
        .enqueue(number, graph, metadata, validation.outputs_to_execute)
        .await;

    if let Some(sid) = &fields.client_id {
        state
            .sessions
            .send_json(
                sid,
                &easel_core::events::ProgressEvent::Queued { job_id, number },
            )
            .await;
    }
    broadcast_status(&state).await;

    tracing::info!(job_id = %job_id, number, front = fields.front, "Job submitted");
    let resp = SubmitResponse {
        job_id,
        number,
        node_errors: validation.node_errors,
    };
    Ok(Json(DataResponse { data: resp }).into_response())
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Latest status snapshot: pending position, running flag, or history
/// outcome. 404 for unknown ids.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job_state = state
        .queue
        .job_state(job_id)
        .await
        .ok_or_else(|| CoreError::job_not_found(job_id))?;
    Ok(Json(DataResponse { data: job_state }))
}

// ---------------------------------------------------------------------------
// One-shot result fetch
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/result
///
/// Returns the first output image of a completed job, base64-encoded,
/// then deletes both the output assets and the original upload. A
/// second fetch therefore 404s.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let entry = state
        .queue
        .history_detail(job_id)
        .await
        .ok_or_else(|| CoreError::job_not_found(job_id))?;
    if entry.status != JobTermination::Completed {
        return Err(AppError::BadRequest(format!(
            "Job {job_id} did not complete"
        )));
    }
    let first = entry
        .outputs
        .images
        .first()
        .ok_or_else(|| CoreError::asset_not_found(format!("result of job {job_id}")))?;

    let bytes = state.store.load(first).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let body = json!({
        "job_id": job_id,
        "name": first.filename,
        "content_type": easel_store::content_type(&first.filename),
        "image": encoded,
    });

    // Consume the result: outputs first, then the upload it came from.
    for asset in &entry.outputs.images {
        if let Err(e) = state.store.remove(asset).await {
            tracing::warn!(asset = %asset.display_path(), error = %e, "Failed to remove output");
        }
    }
    if let Some(input) = &entry.job.metadata.input_asset {
        if let Err(e) = state.store.remove(input).await {
            tracing::warn!(asset = %input.display_path(), error = %e, "Failed to remove upload");
        }
    }
    state.queue.remove_history_items(&[job_id]).await;
    tracing::info!(job_id = %job_id, "Result fetched and consumed");

    Ok(Json(DataResponse { data: body }))
}
