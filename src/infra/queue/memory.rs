//! In-memory queue with score-based ranking.

use std::collections::{BTreeMap, HashMap};

use crate::core::scoring::admission_order;
use crate::core::{JobQueue, QueuedJob, SchedulerError};
use crate::util::serde::{JobId, Priority};

/// In-memory queue keyed by submission sequence.
///
/// Scores depend on the current time, so ranking is computed on demand
/// rather than kept in a heap. Entries are stored in sequence order, which
/// keeps FIFO tie-breaking a stable sort away.
pub struct InMemoryQueue {
    max_depth: usize,
    by_sequence: BTreeMap<u64, QueuedJob>,
    index: HashMap<JobId, u64>,
}

impl InMemoryQueue {
    /// Create a new in-memory queue with a maximum depth.
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            by_sequence: BTreeMap::new(),
            index: HashMap::with_capacity(max_depth.min(1024)),
        }
    }

    /// Whether a job is queued.
    pub fn contains(&self, job_id: &JobId) -> bool {
        self.index.contains_key(job_id)
    }
}

impl JobQueue for InMemoryQueue {
    fn enqueue(&mut self, job: QueuedJob) -> Result<(), SchedulerError> {
        if self.len() >= self.max_depth() {
            return Err(SchedulerError::QueueFull("max queue depth reached".into()));
        }
        if self.index.contains_key(&job.job_id) {
            return Err(SchedulerError::Validation(format!(
                "job {} is already queued",
                job.job_id
            )));
        }
        self.index.insert(job.job_id, job.sequence);
        self.by_sequence.insert(job.sequence, job);
        Ok(())
    }

    fn remove(&mut self, job_id: &JobId) -> Option<QueuedJob> {
        let sequence = self.index.remove(job_id)?;
        self.by_sequence.remove(&sequence)
    }

    fn ranked(&self, now_ms: u128) -> Vec<QueuedJob> {
        let mut jobs: Vec<QueuedJob> = self.by_sequence.values().cloned().collect();
        jobs.sort_by(|a, b| admission_order(a, b, now_ms));
        jobs
    }

    fn depth_by_priority(&self) -> BTreeMap<Priority, usize> {
        let mut depth = BTreeMap::new();
        for job in self.by_sequence.values() {
            *depth.entry(job.priority).or_insert(0) += 1;
        }
        depth
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn len(&self) -> usize {
        self.by_sequence.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::serde::ResourceVector;

    fn make_job(sequence: u64, priority: Priority, entered: u128) -> QueuedJob {
        QueuedJob {
            job_id: uuid::Uuid::new_v4(),
            priority,
            deadline_ms: None,
            queue_entered_at_ms: entered,
            sequence,
            required_resources: ResourceVector::new(),
        }
    }

    #[test]
    fn test_priority_ordering() {
        let mut q = InMemoryQueue::new(100);
        let low = make_job(1, Priority::Low, 0);
        let critical = make_job(2, Priority::Critical, 0);
        let medium = make_job(3, Priority::Medium, 0);
        let high = make_job(4, Priority::High, 0);
        for job in [&low, &critical, &medium, &high] {
            q.enqueue(job.clone()).unwrap();
        }

        let order: Vec<JobId> = q.ranked(0).into_iter().map(|j| j.job_id).collect();
        assert_eq!(order, vec![critical.job_id, high.job_id, medium.job_id, low.job_id]);
    }

    #[test]
    fn test_fifo_within_score() {
        let mut q = InMemoryQueue::new(100);
        let a = make_job(5, Priority::Medium, 0);
        let b = make_job(2, Priority::Medium, 0);
        let c = make_job(9, Priority::Medium, 0);
        q.enqueue(a.clone()).unwrap();
        q.enqueue(b.clone()).unwrap();
        q.enqueue(c.clone()).unwrap();

        let order: Vec<u64> = q.ranked(0).into_iter().map(|j| j.sequence).collect();
        assert_eq!(order, vec![2, 5, 9]);
    }

    #[test]
    fn test_ranking_recomputed_with_time() {
        let mut q = InMemoryQueue::new(100);
        let low = make_job(1, Priority::Low, 0);
        let medium = make_job(2, Priority::Medium, 10 * 60_000);
        q.enqueue(low.clone()).unwrap();
        q.enqueue(medium.clone()).unwrap();

        // low aged 10 minutes scores 11, fresh medium scores 10
        assert_eq!(q.ranked(10 * 60_000)[0].job_id, low.job_id);

        let mut q = InMemoryQueue::new(100);
        let medium = make_job(3, Priority::Medium, 8 * 60_000);
        q.enqueue(low.clone()).unwrap();
        q.enqueue(medium.clone()).unwrap();
        // low aged 8 minutes scores 9, medium still ahead
        assert_eq!(q.ranked(8 * 60_000)[0].job_id, medium.job_id);
    }

    #[test]
    fn test_queue_full() {
        let mut q = InMemoryQueue::new(2);
        q.enqueue(make_job(1, Priority::Medium, 0)).unwrap();
        q.enqueue(make_job(2, Priority::Medium, 0)).unwrap();
        let result = q.enqueue(make_job(3, Priority::Medium, 0));
        assert!(matches!(result, Err(SchedulerError::QueueFull(_))));
    }

    #[test]
    fn test_remove_and_depth() {
        let mut q = InMemoryQueue::new(10);
        let a = make_job(1, Priority::High, 0);
        let b = make_job(2, Priority::High, 0);
        let c = make_job(3, Priority::Low, 0);
        q.enqueue(a.clone()).unwrap();
        q.enqueue(b.clone()).unwrap();
        q.enqueue(c.clone()).unwrap();
        assert_eq!(q.depth_by_priority()[&Priority::High], 2);

        assert_eq!(q.remove(&a.job_id), Some(a.clone()));
        assert!(q.remove(&a.job_id).is_none());
        assert!(!q.contains(&a.job_id));
        assert_eq!(q.len(), 2);
        assert_eq!(q.depth_by_priority()[&Priority::High], 1);
        assert_eq!(q.depth_by_priority()[&Priority::Low], 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut q = InMemoryQueue::new(10);
        let a = make_job(1, Priority::High, 0);
        q.enqueue(a.clone()).unwrap();
        assert!(q.enqueue(a).is_err());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_empty_queue() {
        let q = InMemoryQueue::new(100);
        assert!(q.ranked(0).is_empty());
        assert!(q.is_empty());
        assert!(q.depth_by_priority().is_empty());
    }
}
