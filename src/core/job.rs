//! Job records and the lifecycle state machine.
//!
//! ```text
//! Queued ──admit──▶ Processing ──complete──▶ Completed
//!   │                   ├──────fail────────▶ Failed ──retry──▶ (new job)
//!   └──cancel──▶ Cancelled ◀──cancel──┘
//! ```
//!
//! Terminal states never transition again. Every transition stamps exactly
//! one timestamp, so a terminal record carries exactly one of
//! `completed_at_ms`, `failed_at_ms`, `cancelled_at_ms`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::serde::{JobId, Payload, Priority, ResourceVector};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue for resources.
    Queued,
    /// Resources reserved and the processor is running.
    Processing,
    /// Processor returned a result.
    Completed,
    /// Processor returned an error, panicked, or overran its deadline.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl JobStatus {
    /// True for `Completed`, `Failed` and `Cancelled`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows `self -> next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Processing | Self::Cancelled)
                | (
                    Self::Processing,
                    Self::Completed | Self::Failed | Self::Cancelled
                )
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Persisted job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier assigned at submission.
    pub id: JobId,
    /// Tag selecting the processor.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Base priority.
    pub priority: Priority,
    /// Opaque data handed to the processor.
    pub payload: Payload,
    /// Models the processor should load, passed through untouched.
    #[serde(default)]
    pub required_models: Vec<String>,
    /// Resource requirements fixed at submission.
    pub required_resources: ResourceVector,
    /// Resources actually allocated while processing, kept for audit.
    pub resources: Option<ResourceVector>,
    /// Expected runtime in seconds, used for progress reporting.
    pub estimated_duration_secs: u64,
    /// Optional deadline in milliseconds since epoch.
    pub deadline_ms: Option<u128>,
    /// Current status.
    pub status: JobStatus,
    /// Submission time.
    pub created_at_ms: u128,
    /// Time the job entered the queue; `None` when admitted immediately.
    pub queue_entered_at_ms: Option<u128>,
    /// Time resources were reserved and the processor started.
    pub processing_started_at_ms: Option<u128>,
    /// Set on `Completed`.
    pub completed_at_ms: Option<u128>,
    /// Set on `Failed`.
    pub failed_at_ms: Option<u128>,
    /// Set on `Cancelled`.
    pub cancelled_at_ms: Option<u128>,
    /// Processor result, only on `Completed`.
    pub result: Option<Payload>,
    /// Failure message, only on `Failed`.
    pub error: Option<String>,
    /// Monotonic submission counter used to break score ties.
    pub sequence: u64,
    /// The failed job this one retries, if any.
    pub retry_of: Option<JobId>,
}

/// Fields needed to mint a new [`Job`].
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Processor tag.
    pub job_type: String,
    /// Base priority.
    pub priority: Priority,
    /// Opaque payload.
    pub payload: Payload,
    /// Models passed through to the processor.
    pub required_models: Vec<String>,
    /// Estimated requirements.
    pub required_resources: ResourceVector,
    /// Expected runtime in seconds.
    pub estimated_duration_secs: u64,
    /// Optional deadline.
    pub deadline_ms: Option<u128>,
    /// Origin of a retry.
    pub retry_of: Option<JobId>,
}

impl Job {
    /// Mint a new `Queued` job with a fresh id.
    pub fn new(new_job: NewJob, sequence: u64, now_ms: u128) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            job_type: new_job.job_type,
            priority: new_job.priority,
            payload: new_job.payload,
            required_models: new_job.required_models,
            required_resources: new_job.required_resources,
            resources: None,
            estimated_duration_secs: new_job.estimated_duration_secs,
            deadline_ms: new_job.deadline_ms,
            status: JobStatus::Queued,
            created_at_ms: now_ms,
            queue_entered_at_ms: None,
            processing_started_at_ms: None,
            completed_at_ms: None,
            failed_at_ms: None,
            cancelled_at_ms: None,
            result: None,
            error: None,
            sequence,
            retry_of: new_job.retry_of,
        }
    }

    /// Submission fields of this job, used to build a retry.
    pub fn to_new_job(&self) -> NewJob {
        NewJob {
            job_type: self.job_type.clone(),
            priority: self.priority,
            payload: self.payload.clone(),
            required_models: self.required_models.clone(),
            required_resources: self.required_resources.clone(),
            estimated_duration_secs: self.estimated_duration_secs,
            deadline_ms: self.deadline_ms,
            retry_of: Some(self.id),
        }
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(to) {
            return Err(SchedulerError::InvalidTransition {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Record that the job is waiting in the queue.
    pub fn mark_enqueued(&mut self, now_ms: u128) -> Result<(), SchedulerError> {
        if self.status != JobStatus::Queued {
            return Err(SchedulerError::InvalidTransition {
                job_id: self.id,
                from: self.status,
                to: JobStatus::Queued,
            });
        }
        self.queue_entered_at_ms = Some(now_ms);
        Ok(())
    }

    /// `Queued -> Processing` with the allocated resources.
    pub fn admit(&mut self, now_ms: u128, allocated: ResourceVector) -> Result<(), SchedulerError> {
        self.transition(JobStatus::Processing)?;
        self.processing_started_at_ms = Some(now_ms);
        self.resources = Some(allocated);
        Ok(())
    }

    /// `Processing -> Completed`.
    pub fn complete(&mut self, now_ms: u128, result: Payload) -> Result<(), SchedulerError> {
        self.transition(JobStatus::Completed)?;
        self.completed_at_ms = Some(now_ms);
        self.result = Some(result);
        Ok(())
    }

    /// `Processing -> Failed`.
    pub fn fail(&mut self, now_ms: u128, error: impl Into<String>) -> Result<(), SchedulerError> {
        self.transition(JobStatus::Failed)?;
        self.failed_at_ms = Some(now_ms);
        self.error = Some(error.into());
        Ok(())
    }

    /// `Queued | Processing -> Cancelled`.
    pub fn cancel(&mut self, now_ms: u128) -> Result<(), SchedulerError> {
        self.transition(JobStatus::Cancelled)?;
        self.cancelled_at_ms = Some(now_ms);
        Ok(())
    }

    /// The single terminal timestamp, if the job is terminal.
    pub fn terminal_at_ms(&self) -> Option<u128> {
        self.completed_at_ms
            .or(self.failed_at_ms)
            .or(self.cancelled_at_ms)
    }

    /// Time spent queued, for jobs that were queued and later started.
    pub fn queue_time_ms(&self) -> Option<u128> {
        let entered = self.queue_entered_at_ms?;
        let started = self.processing_started_at_ms?;
        Some(started.saturating_sub(entered))
    }

    /// Time spent processing, for jobs that started and finished.
    pub fn processing_time_ms(&self) -> Option<u128> {
        let started = self.processing_started_at_ms?;
        let ended = self.terminal_at_ms()?;
        Some(ended.saturating_sub(started))
    }

    /// Time from submission to terminal state.
    pub fn total_time_ms(&self) -> Option<u128> {
        Some(self.terminal_at_ms()?.saturating_sub(self.created_at_ms))
    }

    /// Progress estimate: `min(elapsed / estimated, 0.99)` while processing,
    /// `1.0` once completed, `None` otherwise.
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self, now_ms: u128) -> Option<f64> {
        match self.status {
            JobStatus::Completed => Some(1.0),
            JobStatus::Processing => {
                let started = self.processing_started_at_ms?;
                let elapsed = now_ms.saturating_sub(started) as f64;
                let estimated = (u128::from(self.estimated_duration_secs) * 1000) as f64;
                if estimated <= 0.0 {
                    return Some(0.99);
                }
                Some((elapsed / estimated).min(0.99))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::serde::{COMPUTE, MEMORY};

    fn make_job() -> Job {
        Job::new(
            NewJob {
                job_type: "recommendation_batch".into(),
                priority: Priority::High,
                payload: serde_json::json!({"user": 7}),
                required_models: vec!["ranker-v2".into()],
                required_resources: ResourceVector::new().with(COMPUTE, 2).with(MEMORY, 1024),
                estimated_duration_secs: 10,
                deadline_ms: None,
                retry_of: None,
            },
            1,
            1_000,
        )
    }

    fn terminal_stamps(job: &Job) -> usize {
        [job.completed_at_ms, job.failed_at_ms, job.cancelled_at_ms]
            .iter()
            .filter(|t| t.is_some())
            .count()
    }

    #[test]
    fn happy_path_sets_one_terminal_timestamp() {
        let mut job = make_job();
        job.mark_enqueued(1_000).unwrap();
        job.admit(4_000, job.required_resources.clone()).unwrap();
        assert_eq!(terminal_stamps(&job), 0);
        job.complete(9_000, serde_json::json!("ok")).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(terminal_stamps(&job), 1);
        assert_eq!(job.queue_time_ms(), Some(3_000));
        assert_eq!(job.processing_time_ms(), Some(5_000));
        assert_eq!(job.total_time_ms(), Some(8_000));
        assert!(job.error.is_none());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut job = make_job();
        job.cancel(2_000).unwrap();
        assert!(matches!(
            job.admit(3_000, ResourceVector::new()),
            Err(SchedulerError::InvalidTransition { .. })
        ));
        assert!(job.cancel(3_000).is_err());
        assert_eq!(job.cancelled_at_ms, Some(2_000));
        assert_eq!(terminal_stamps(&job), 1);
    }

    #[test]
    fn queued_job_cannot_complete_or_fail() {
        let mut job = make_job();
        assert!(job.complete(2_000, Payload::Null).is_err());
        assert!(job.fail(2_000, "nope").is_err());
        assert_eq!(job.status, JobStatus::Queued);
    }

    #[test]
    fn progress_caps_below_one_until_completed() {
        let mut job = make_job();
        assert_eq!(job.progress(5_000), None);
        job.admit(1_000, ResourceVector::new()).unwrap();
        let half = job.progress(6_000).unwrap();
        assert!((half - 0.5).abs() < 1e-9);
        assert!((job.progress(60_000).unwrap() - 0.99).abs() < 1e-9);
        job.fail(61_000, "oom").unwrap();
        assert_eq!(job.progress(62_000), None);
    }

    #[test]
    fn retry_template_links_origin_and_copies_fields() {
        let job = make_job();
        let new_job = job.to_new_job();
        assert_eq!(new_job.retry_of, Some(job.id));
        assert_eq!(new_job.payload, job.payload);
        assert_eq!(new_job.required_models, job.required_models);
        let retried = Job::new(new_job, 2, 5_000);
        assert_ne!(retried.id, job.id);
        assert_eq!(retried.priority, job.priority);
    }

    #[test]
    fn record_serializes_type_field() {
        let json = serde_json::to_value(make_job()).unwrap();
        assert_eq!(json["type"], "recommendation_batch");
        assert_eq!(json["status"], "queued");
    }
}
