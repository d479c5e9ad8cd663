//! In-memory job queue with a single global execution slot.
//!
//! Pending jobs are ordered by `(priority, arrival)`; the one consumer
//! suspends in [`JobQueue::dequeue_next`] until a job exists and the
//! execution slot is free. Queue and history are deliberately not
//! persisted: a restart starts empty.

mod job;
mod queue;

pub use job::{
    HistoryEntry, Job, JobMetadata, JobState, JobTermination, JobView, QueueSnapshot, RunningJob,
};
pub use queue::{CancelOutcome, JobQueue};
