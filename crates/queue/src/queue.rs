//! The queue proper: one critical section, one execution slot.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use easel_core::error::CoreError;
use easel_core::events::JobOutputs;
use easel_core::graph::{Graph, NodeId};
use easel_core::types::JobId;

use crate::job::{
    HistoryEntry, Job, JobMetadata, JobState, JobTermination, JobView, QueueSnapshot, RunningJob,
};

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still pending and has been removed.
    RemovedPending,
    /// The job is running; its interruption flag was set. Execution
    /// stops whenever the executor next observes the flag.
    InterruptRequested,
    /// No pending or running job with that id.
    NotFound,
}

/// A pending job plus its arrival sequence (the FIFO tie-breaker).
struct PendingJob {
    seq: u64,
    job: Arc<Job>,
}

/// The currently executing job and its cancellation token.
struct RunningSlot {
    job: Arc<Job>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    pending: Vec<PendingJob>,
    running: Option<RunningSlot>,
    history: Vec<HistoryEntry>,
    next_seq: u64,
}

impl Inner {
    /// Index of the next job in dequeue order: minimum priority,
    /// earliest arrival on ties.
    fn next_index(&self) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.job.priority, p.seq))
            .map(|(i, _)| i)
    }

    /// Pending indices sorted into dequeue order.
    fn dequeue_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.pending.len()).collect();
        order.sort_by_key(|&i| (self.pending[i].job.priority, self.pending[i].seq));
        order
    }
}

/// Ordered in-memory job queue with at most one running job.
///
/// All mutation goes through a single async mutex, never held across a
/// suspension point. Producers never block; the sole consumer suspends
/// in [`dequeue_next`](JobQueue::dequeue_next) until work exists and
/// the execution slot is free. The slot is part of the structure, not
/// a property of the consumer: a second concurrent consumer would still
/// observe at most one running job.
pub struct JobQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    /// Add a validated job to the pending set and return its id.
    ///
    /// Validation happens before this call (against the executor
    /// contract); a job is either fully enqueued or not at all.
    pub async fn enqueue(
        &self,
        priority: i64,
        graph: Graph,
        metadata: JobMetadata,
        outputs_to_execute: Vec<NodeId>,
    ) -> JobId {
        let job = Arc::new(Job {
            id: uuid::Uuid::new_v4(),
            priority,
            graph,
            metadata,
            outputs_to_execute,
            submitted_at: chrono::Utc::now(),
        });
        let id = job.id;

        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending.push(PendingJob { seq, job });
        drop(inner);

        self.notify.notify_one();
        tracing::debug!(job_id = %id, priority, "Job enqueued");
        id
    }

    /// Wait until a pending job exists and the execution slot is free,
    /// then move the selected job into the slot and return it.
    ///
    /// This is the only way a job reaches the running state.
    pub async fn dequeue_next(&self) -> RunningJob {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if inner.running.is_none() {
                    if let Some(idx) = inner.next_index() {
                        let PendingJob { job, .. } = inner.pending.swap_remove(idx);
                        let cancel = CancellationToken::new();
                        inner.running = Some(RunningSlot {
                            job: Arc::clone(&job),
                            cancel: cancel.clone(),
                        });
                        tracing::debug!(job_id = %job.id, "Job dequeued into execution slot");
                        return RunningJob { job, cancel };
                    }
                }
            }
            self.notify.notified().await;
        }
    }

    /// Move the running job to history as completed, recording its
    /// outputs, and free the execution slot.
    pub async fn complete(&self, job_id: JobId, outputs: JobOutputs) -> Result<(), CoreError> {
        self.finish(job_id, JobTermination::Completed, outputs).await
    }

    /// Move the running job to history as failed.
    pub async fn fail(&self, job_id: JobId, error: String) -> Result<(), CoreError> {
        self.finish(job_id, JobTermination::Failed { error }, JobOutputs::default())
            .await
    }

    /// Move the running job to history as interrupted.
    pub async fn interrupted(&self, job_id: JobId) -> Result<(), CoreError> {
        self.finish(job_id, JobTermination::Interrupted, JobOutputs::default())
            .await
    }

    async fn finish(
        &self,
        job_id: JobId,
        status: JobTermination,
        outputs: JobOutputs,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        match &inner.running {
            Some(slot) if slot.job.id == job_id => {}
            _ => return Err(CoreError::job_not_found(job_id)),
        }
        let slot = inner.running.take().expect("checked above");
        inner.history.push(HistoryEntry {
            job: slot.job,
            status,
            outputs,
            finished_at: chrono::Utc::now(),
        });
        drop(inner);

        // The slot is free again; wake the consumer.
        self.notify.notify_one();
        Ok(())
    }

    /// Cancel a job. Pending jobs move straight to history as
    /// interrupted; the running job gets its cooperative interruption
    /// flag set with no guarantee of an immediate stop.
    pub async fn cancel(&self, job_id: JobId) -> CancelOutcome {
        let mut inner = self.inner.lock().await;
        if let Some(idx) = inner.pending.iter().position(|p| p.job.id == job_id) {
            let PendingJob { job, .. } = inner.pending.swap_remove(idx);
            inner.history.push(HistoryEntry {
                job,
                status: JobTermination::Interrupted,
                outputs: JobOutputs::default(),
                finished_at: chrono::Utc::now(),
            });
            tracing::info!(job_id = %job_id, "Pending job cancelled");
            return CancelOutcome::RemovedPending;
        }
        if let Some(slot) = &inner.running {
            if slot.job.id == job_id {
                slot.cancel.cancel();
                tracing::info!(job_id = %job_id, "Interruption requested for running job");
                return CancelOutcome::InterruptRequested;
            }
        }
        CancelOutcome::NotFound
    }

    /// Request interruption of whatever job is running, if any.
    pub async fn interrupt_running(&self) -> bool {
        let inner = self.inner.lock().await;
        if let Some(slot) = &inner.running {
            slot.cancel.cancel();
            tracing::info!(job_id = %slot.job.id, "Interruption requested");
            true
        } else {
            false
        }
    }

    // -- administrative bulk operations ------------------------------------

    /// Drop all pending jobs. Does not touch the running job.
    pub async fn clear_pending(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let n = inner.pending.len();
        inner.pending.clear();
        n
    }

    /// Remove specific pending jobs by id.
    pub async fn remove_pending(&self, ids: &[JobId]) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.pending.len();
        inner.pending.retain(|p| !ids.contains(&p.job.id));
        before - inner.pending.len()
    }

    /// Drop all history entries.
    pub async fn clear_history(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let n = inner.history.len();
        inner.history.clear();
        n
    }

    /// Remove specific history entries by job id.
    pub async fn remove_history_items(&self, ids: &[JobId]) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.history.len();
        inner.history.retain(|h| !ids.contains(&h.job.id));
        before - inner.history.len()
    }

    // -- snapshots ----------------------------------------------------------

    /// Running + pending listing in dequeue order.
    pub async fn queue_snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock().await;
        let queue_running = inner.running.as_ref().map(|s| JobView::from(s.job.as_ref()));
        let queue_pending = inner
            .dequeue_order()
            .into_iter()
            .map(|i| JobView::from(inner.pending[i].job.as_ref()))
            .collect();
        QueueSnapshot {
            queue_running,
            queue_pending,
        }
    }

    /// Most recent history entries, newest last, optionally limited.
    pub async fn history(&self, max_items: Option<usize>) -> Vec<serde_json::Value> {
        let inner = self.inner.lock().await;
        let entries = inner.history.iter();
        match max_items {
            Some(n) => {
                let skip = inner.history.len().saturating_sub(n);
                entries.skip(skip).map(|e| e.view()).collect()
            }
            None => entries.map(|e| e.view()).collect(),
        }
    }

    /// Full history entry for one job, if it finished.
    pub async fn history_detail(&self, job_id: JobId) -> Option<HistoryEntry> {
        let inner = self.inner.lock().await;
        inner.history.iter().find(|h| h.job.id == job_id).cloned()
    }

    /// Where a job currently is, or `None` if unknown.
    pub async fn job_state(&self, job_id: JobId) -> Option<JobState> {
        let inner = self.inner.lock().await;
        if let Some(slot) = &inner.running {
            if slot.job.id == job_id {
                return Some(JobState::Running {
                    cancel_requested: slot.cancel.is_cancelled(),
                });
            }
        }
        if let Some(position) = inner
            .dequeue_order()
            .into_iter()
            .position(|i| inner.pending[i].job.id == job_id)
        {
            return Some(JobState::Pending { position });
        }
        inner
            .history
            .iter()
            .find(|h| h.job.id == job_id)
            .map(|h| JobState::History {
                status: h.status.clone(),
                outputs: h.outputs.clone(),
            })
    }

    /// Jobs that still need the executor: pending plus running.
    pub async fn tasks_remaining(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.pending.len() + usize::from(inner.running.is_some())
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn graph_with_label(label: &str) -> Graph {
        serde_json::from_value(serde_json::json!({
            "1": {"class_type": "Label", "inputs": {"text": label}}
        }))
        .unwrap()
    }

    async fn enqueue_labeled(queue: &JobQueue, priority: i64, label: &str) -> JobId {
        queue
            .enqueue(
                priority,
                graph_with_label(label),
                JobMetadata::default(),
                vec!["1".into()],
            )
            .await
    }

    fn label_of(job: &Job) -> String {
        job.graph.input("1", "text").unwrap().as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn dequeue_orders_by_priority_then_arrival() {
        let queue = JobQueue::new();
        enqueue_labeled(&queue, 0, "A").await;
        enqueue_labeled(&queue, -1, "B").await;
        enqueue_labeled(&queue, 0, "C").await;

        let mut labels = Vec::new();
        for _ in 0..3 {
            let running = queue.dequeue_next().await;
            labels.push(label_of(&running.job));
            queue.complete(running.job.id, JobOutputs::default()).await.unwrap();
        }
        assert_eq!(labels, ["B", "A", "C"]);
    }

    #[tokio::test]
    async fn at_most_one_job_runs_at_a_time() {
        let queue = Arc::new(JobQueue::new());
        enqueue_labeled(&queue, 0, "first").await;
        enqueue_labeled(&queue, 0, "second").await;

        let first = queue.dequeue_next().await;

        // A second consumer must suspend while the slot is occupied,
        // even though a pending job exists.
        let q2 = Arc::clone(&queue);
        let waiter = tokio::spawn(async move { q2.dequeue_next().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        queue.complete(first.job.id, JobOutputs::default()).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("slot must free up")
            .unwrap();
        assert_eq!(label_of(&second.job), "second");
    }

    #[tokio::test]
    async fn dequeue_suspends_until_enqueue() {
        let queue = Arc::new(JobQueue::new());
        let q2 = Arc::clone(&queue);
        let waiter = tokio::spawn(async move { q2.dequeue_next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let id = enqueue_labeled(&queue, 0, "late").await;
        let running = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("enqueue must wake the consumer")
            .unwrap();
        assert_eq!(running.job.id, id);
    }

    #[tokio::test]
    async fn cancel_pending_removes_from_future_dequeues() {
        let queue = JobQueue::new();
        let doomed = enqueue_labeled(&queue, -10, "doomed").await;
        let kept = enqueue_labeled(&queue, 0, "kept").await;

        assert_eq!(queue.cancel(doomed).await, CancelOutcome::RemovedPending);
        assert_matches!(
            queue.job_state(doomed).await,
            Some(JobState::History {
                status: JobTermination::Interrupted,
                ..
            })
        );

        let running = queue.dequeue_next().await;
        assert_eq!(running.job.id, kept);
    }

    #[tokio::test]
    async fn cancel_running_sets_flag_but_keeps_job_running() {
        let queue = JobQueue::new();
        let id = enqueue_labeled(&queue, 0, "slow").await;
        let running = queue.dequeue_next().await;

        assert_eq!(queue.cancel(id).await, CancelOutcome::InterruptRequested);
        assert!(running.cancel.is_cancelled());
        assert_matches!(
            queue.job_state(id).await,
            Some(JobState::Running {
                cancel_requested: true
            })
        );
    }

    #[tokio::test]
    async fn cancel_unknown_job_reports_not_found() {
        let queue = JobQueue::new();
        assert_eq!(
            queue.cancel(uuid::Uuid::new_v4()).await,
            CancelOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn complete_moves_job_to_history_with_outputs() {
        let queue = JobQueue::new();
        let id = enqueue_labeled(&queue, 0, "done").await;
        let running = queue.dequeue_next().await;

        let outputs = JobOutputs {
            images: vec![easel_core::assets::AssetRef::new(
                easel_core::assets::Bucket::Output,
                "",
                "out.png",
            )],
        };
        queue.complete(running.job.id, outputs).await.unwrap();

        match queue.job_state(id).await {
            Some(JobState::History { status, outputs }) => {
                assert_eq!(status, JobTermination::Completed);
                assert_eq!(outputs.images[0].filename, "out.png");
            }
            other => panic!("expected history state, got {other:?}"),
        }
        assert_eq!(queue.tasks_remaining().await, 0);
    }

    #[tokio::test]
    async fn complete_with_wrong_id_is_not_found() {
        let queue = JobQueue::new();
        enqueue_labeled(&queue, 0, "x").await;
        let _running = queue.dequeue_next().await;
        let err = queue
            .complete(uuid::Uuid::new_v4(), JobOutputs::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { .. });
    }

    #[tokio::test]
    async fn admin_bulk_operations() {
        let queue = JobQueue::new();
        let a = enqueue_labeled(&queue, 0, "a").await;
        let _b = enqueue_labeled(&queue, 0, "b").await;
        let c = enqueue_labeled(&queue, 0, "c").await;

        assert_eq!(queue.remove_pending(&[a]).await, 1);
        assert_eq!(queue.clear_pending().await, 2);
        assert!(queue.job_state(c).await.is_none());

        // Build up some history, then prune it.
        let d = enqueue_labeled(&queue, 0, "d").await;
        let running = queue.dequeue_next().await;
        queue.fail(running.job.id, "boom".into()).await.unwrap();
        assert_eq!(queue.history(None).await.len(), 1);
        assert_eq!(queue.remove_history_items(&[d]).await, 1);
        assert_eq!(queue.clear_history().await, 0);
    }

    #[tokio::test]
    async fn history_listing_honours_max_items() {
        let queue = JobQueue::new();
        for i in 0..5 {
            enqueue_labeled(&queue, 0, &format!("j{i}")).await;
            let running = queue.dequeue_next().await;
            queue.complete(running.job.id, JobOutputs::default()).await.unwrap();
        }
        assert_eq!(queue.history(None).await.len(), 5);
        assert_eq!(queue.history(Some(2)).await.len(), 2);
    }

    #[tokio::test]
    async fn pending_state_reports_dequeue_position() {
        let queue = JobQueue::new();
        let a = enqueue_labeled(&queue, 5, "a").await;
        let b = enqueue_labeled(&queue, -5, "b").await;

        assert_matches!(
            queue.job_state(b).await,
            Some(JobState::Pending { position: 0 })
        );
        assert_matches!(
            queue.job_state(a).await,
            Some(JobState::Pending { position: 1 })
        );
    }
}
