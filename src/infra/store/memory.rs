//! In-memory job store.

use std::collections::HashMap;

use crate::core::{Job, JobStore, SchedulerError};
use crate::util::serde::JobId;

/// Simple in-memory job store for development/testing.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: HashMap<JobId, Job>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for InMemoryJobStore {
    fn save(&mut self, job: &Job) -> Result<(), SchedulerError> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn load(&self, job_id: &JobId) -> Result<Option<Job>, SchedulerError> {
        Ok(self.jobs.get(job_id).cloned())
    }

    fn list(&self) -> Result<Vec<Job>, SchedulerError> {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.sequence);
        Ok(jobs)
    }
}
