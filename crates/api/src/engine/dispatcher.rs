use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use easel_core::events::{JobOutputs, ProgressEvent, BINARY_PREVIEW_IMAGE};
use easel_queue::RunningJob;
use easel_store::{render_preview, PreviewFormat};

use crate::state::AppState;
use crate::ws::status_event;

/// Bound on in-flight progress events per job.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Previews sent over the binary path are capped at this edge length.
const PREVIEW_MAX_DIMENSION: u32 = 512;

const PREVIEW_QUALITY: u8 = 75;

/// Spawn the dispatcher task.
///
/// It runs until `cancel` trips, finishing the in-flight job first.
pub fn start_dispatcher(state: AppState, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Dispatcher started");
        loop {
            let running = tokio::select! {
                _ = cancel.cancelled() => break,
                running = state.queue.dequeue_next() => running,
            };
            process_job(&state, running).await;
            broadcast_status(&state).await;
        }
        tracing::info!("Dispatcher stopped");
    })
}

/// Push the current queue depth to every connected session.
pub async fn broadcast_status(state: &AppState) {
    let remaining = state.queue.tasks_remaining().await;
    state
        .sessions
        .broadcast_json(&status_event(remaining, None))
        .await;
}

/// Run one job to a terminal state.
///
/// Events the executor emits while running are forwarded to the owning
/// session by a dedicated task, preserving per-job emission order. A
/// vanished session drops its events without affecting execution.
async fn process_job(state: &AppState, running: RunningJob) {
    let job = Arc::clone(&running.job);
    let session_id = job.metadata.session_id.clone();
    let (tx, mut rx) = mpsc::channel::<ProgressEvent>(EVENT_CHANNEL_CAPACITY);

    let sessions = Arc::clone(&state.sessions);
    let forward_sid = session_id.clone();
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(sid) = &forward_sid {
                sessions.send_json(sid, &event).await;
            }
        }
    });

    let result = state
        .executor
        .execute(
            job.id,
            &job.graph,
            &job.outputs_to_execute,
            tx,
            running.cancel.clone(),
        )
        .await;
    // The executor dropped its sender; wait for the last events to
    // flush before emitting terminal ones.
    let _ = forward.await;

    match result {
        Ok(outputs) => {
            if let Err(e) = state.queue.complete(job.id, outputs.clone()).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record completion");
            }
            if let Some(sid) = &session_id {
                send_preview(state, sid, &outputs).await;
                state
                    .sessions
                    .send_json(
                        sid,
                        &ProgressEvent::Executing {
                            job_id: job.id,
                            node: None,
                        },
                    )
                    .await;
                state
                    .sessions
                    .send_json(
                        sid,
                        &ProgressEvent::Done {
                            job_id: job.id,
                            outputs,
                        },
                    )
                    .await;
            }
            tracing::info!(job_id = %job.id, "Job completed");
        }
        Err(e) if running.cancel.is_cancelled() => {
            tracing::info!(job_id = %job.id, reason = %e, "Job interrupted");
            if let Err(e) = state.queue.interrupted(job.id).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record interruption");
            }
            if let Some(sid) = &session_id {
                state
                    .sessions
                    .send_json(
                        sid,
                        &ProgressEvent::Executing {
                            job_id: job.id,
                            node: None,
                        },
                    )
                    .await;
            }
        }
        Err(e) => {
            tracing::warn!(job_id = %job.id, error = %e, "Job failed");
            let message = e.to_string();
            if let Err(e) = state.queue.fail(job.id, message.clone()).await {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record failure");
            }
            if let Some(sid) = &session_id {
                state
                    .sessions
                    .send_json(
                        sid,
                        &ProgressEvent::Error {
                            job_id: job.id,
                            message,
                            node: None,
                        },
                    )
                    .await;
            }
        }
    }
}

/// Push a downsized preview of the first output over the binary path.
///
/// Best-effort: a missing or undecodable output only loses the preview,
/// never the job.
async fn send_preview(state: &AppState, session_id: &str, outputs: &JobOutputs) {
    let Some(first) = outputs.images.first() else {
        return;
    };
    let bytes = match state.store.load(first).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(asset = %first.display_path(), error = %e, "No preview source");
            return;
        }
    };
    match render_preview(
        &bytes,
        PreviewFormat::Jpeg,
        PREVIEW_QUALITY,
        Some(PREVIEW_MAX_DIMENSION),
    ) {
        Ok(preview) => {
            state
                .sessions
                .send_binary(session_id, BINARY_PREVIEW_IMAGE, &preview)
                .await;
        }
        Err(e) => {
            tracing::debug!(asset = %first.display_path(), error = %e, "Preview encoding failed");
        }
    }
}
