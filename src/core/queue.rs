//! Queue abstraction for admission-pending jobs.

use std::collections::BTreeMap;

use crate::core::SchedulerError;
use crate::util::serde::{JobId, Priority, ResourceVector};

/// Scheduling view of a queued job: everything the scoring and fit checks
/// need, without the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    /// Job identifier.
    pub job_id: JobId,
    /// Base priority.
    pub priority: Priority,
    /// Optional deadline.
    pub deadline_ms: Option<u128>,
    /// When the job entered the queue.
    pub queue_entered_at_ms: u128,
    /// Submission sequence, the tie-breaker.
    pub sequence: u64,
    /// Requirements checked against the pool.
    pub required_resources: ResourceVector,
}

/// Abstraction for queue backends.
pub trait JobQueue {
    /// Enqueue a job if space permits.
    fn enqueue(&mut self, job: QueuedJob) -> Result<(), SchedulerError>;
    /// Remove a job by id, returning it if present.
    fn remove(&mut self, job_id: &JobId) -> Option<QueuedJob>;
    /// Queued jobs in admission order at `now_ms`: descending score, FIFO on ties.
    fn ranked(&self, now_ms: u128) -> Vec<QueuedJob>;
    /// Queue depth broken down by priority.
    fn depth_by_priority(&self) -> BTreeMap<Priority, usize>;
    /// Maximum depth allowed for this queue.
    fn max_depth(&self) -> usize;
    /// Current depth.
    fn len(&self) -> usize;
    /// True when nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
