//! Job record store abstraction.

use crate::core::{Job, SchedulerError};
use crate::util::serde::JobId;

/// Repository of job records.
///
/// The scheduler writes every lifecycle change through `save` while holding
/// its state lock, so a store only has to be consistent per call. Records are
/// never deleted by the scheduler; purging is the store owner's concern.
pub trait JobStore {
    /// Insert or replace a record.
    fn save(&mut self, job: &Job) -> Result<(), SchedulerError>;
    /// Load a record by id.
    fn load(&self, job_id: &JobId) -> Result<Option<Job>, SchedulerError>;
    /// Every stored record.
    fn list(&self) -> Result<Vec<Job>, SchedulerError>;
}
