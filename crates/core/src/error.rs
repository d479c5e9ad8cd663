use crate::types::JobId;

/// Domain error taxonomy shared by all workspace crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A submitted graph failed pre-enqueue validation. The job was
    /// never enqueued.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A path-producing operation tried to escape its bucket root.
    /// Rejected before any I/O is performed.
    #[error("Security violation: {0}")]
    Security(String),

    /// A missing asset, job, or history entry. Structured absence, not
    /// a fault.
    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    /// The style catalog is malformed or a template is missing a slot
    /// its kind requires.
    #[error("Template error: {0}")]
    Template(String),

    /// A send to a closed or missing session channel. Logged and
    /// swallowed by the broadcaster; never surfaced to clients.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Anything else: I/O faults, codec failures, poisoned state.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing job.
    pub fn job_not_found(id: JobId) -> Self {
        CoreError::NotFound {
            entity: "Job",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing asset.
    pub fn asset_not_found(path: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: "Asset",
            id: path.into(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Internal(err.to_string())
    }
}
