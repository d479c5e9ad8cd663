//! Job records and the snapshot views handed to the API layer.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use easel_core::assets::AssetRef;
use easel_core::events::JobOutputs;
use easel_core::graph::{Graph, NodeId};
use easel_core::types::{JobId, SessionId, Timestamp};

/// Caller-supplied context carried by a job.
///
/// The session reference is weak: the job outlives a disconnect, and
/// events for a vanished session are silently dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobMetadata {
    pub session_id: Option<SessionId>,
    /// The stored upload this job was built from, if any. Used for
    /// one-shot result retrieval and explicit cleanup.
    pub input_asset: Option<AssetRef>,
}

/// One queued/running/completed execution request.
///
/// Immutable after enqueue; the only mutable aspect is the cooperative
/// cancellation token the queue keeps alongside the running job.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    /// Lower runs earlier; ties break by arrival order.
    pub priority: i64,
    pub graph: Graph,
    pub metadata: JobMetadata,
    pub outputs_to_execute: Vec<NodeId>,
    pub submitted_at: Timestamp,
}

/// A job handed to the executor, together with its cancellation token.
#[derive(Debug, Clone)]
pub struct RunningJob {
    pub job: Arc<Job>,
    pub cancel: CancellationToken,
}

/// How a job left the running state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTermination {
    Completed,
    Failed { error: String },
    Interrupted,
}

/// A finished job as kept in history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub job: Arc<Job>,
    pub status: JobTermination,
    pub outputs: JobOutputs,
    pub finished_at: Timestamp,
}

impl HistoryEntry {
    /// Serializable listing/detail view.
    pub fn view(&self) -> serde_json::Value {
        serde_json::json!({
            "job": JobView::from(self.job.as_ref()),
            "status": self.status,
            "outputs": self.outputs,
            "finished_at": self.finished_at,
        })
    }
}

/// Serializable summary of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub number: i64,
    pub session_id: Option<SessionId>,
    pub submitted_at: Timestamp,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            number: job.priority,
            session_id: job.metadata.session_id.clone(),
            submitted_at: job.submitted_at,
        }
    }
}

/// Point-in-time picture of the queue: the running job plus pending
/// jobs in dequeue order.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub queue_running: Option<JobView>,
    pub queue_pending: Vec<JobView>,
}

/// Where a single job currently is, for status lookups.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Waiting, with its current position in dequeue order (0 = next).
    Pending { position: usize },
    /// Executing; `cancel_requested` is the cooperative interruption
    /// flag.
    Running { cancel_requested: bool },
    /// Finished; outputs are present for completed jobs.
    History {
        status: JobTermination,
        outputs: JobOutputs,
    },
}
