//! Progress events and wire framing.
//!
//! The gateway pushes JSON events over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`. A separate binary path carries
//! bulk payloads (preview images) prefixed with a big-endian `u32`
//! frame tag so receivers can tell the two apart unambiguously.
//!
//! Events are ephemeral: they are never persisted, and per-job emission
//! order is the only ordering guarantee.

use serde::{Deserialize, Serialize};

use crate::assets::AssetRef;
use crate::graph::NodeId;
use crate::types::JobId;

/// Output assets produced by a finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOutputs {
    pub images: Vec<AssetRef>,
}

/// A progress event for one job's lifecycle.
///
/// Serialized via the `"type"` tag with `"data"` content, matching the
/// text frames clients receive. `Executing { node: None }` is the
/// terminal event for a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The job was accepted and placed in the pending queue.
    Queued { job_id: JobId, number: i64 },

    /// A node is currently executing; `None` means the job finished.
    Executing {
        job_id: JobId,
        node: Option<NodeId>,
    },

    /// Step progress within a long-running node.
    Progress {
        job_id: JobId,
        value: u32,
        max: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        node: Option<NodeId>,
    },

    /// Execution failed.
    Error {
        job_id: JobId,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        node: Option<NodeId>,
    },

    /// The job completed and its outputs are fetchable.
    Done { job_id: JobId, outputs: JobOutputs },
}

impl ProgressEvent {
    /// The job this event belongs to.
    pub fn job_id(&self) -> JobId {
        match self {
            ProgressEvent::Queued { job_id, .. }
            | ProgressEvent::Executing { job_id, .. }
            | ProgressEvent::Progress { job_id, .. }
            | ProgressEvent::Error { job_id, .. }
            | ProgressEvent::Done { job_id, .. } => *job_id,
        }
    }

    /// Whether this is a terminal event for the job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Executing { node: None, .. }
                | ProgressEvent::Error { .. }
                | ProgressEvent::Done { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Binary framing
// ---------------------------------------------------------------------------

/// Frame tag for a downsized preview image.
pub const BINARY_PREVIEW_IMAGE: u32 = 1;

/// Prefix a binary payload with its big-endian `u32` frame tag.
pub fn encode_binary_frame(tag: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&tag.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
