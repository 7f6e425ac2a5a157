//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{JobMetrics, JobStatus};
use crate::util::serde::{JobId, Payload, Priority};

/// Job submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    /// Job type selecting the processor. Empty is rejected.
    #[serde(rename = "type", default)]
    pub job_type: String,
    /// Priority, `medium` when omitted.
    #[serde(default)]
    pub priority: Priority,
    /// Opaque payload.
    #[serde(default)]
    pub payload: Payload,
    /// Optional deadline (ms since epoch).
    #[serde(default)]
    pub deadline_ms: Option<u128>,
    /// Optional runtime estimate overriding the table default.
    #[serde(default)]
    pub estimated_duration_secs: Option<u64>,
    /// Models passed through to the processor.
    #[serde(default)]
    pub required_models: Vec<String>,
}

impl SubmitJobRequest {
    /// Request with default priority and a null payload.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            priority: Priority::default(),
            payload: Payload::Null,
            deadline_ms: None,
            estimated_duration_secs: None,
            required_models: Vec::new(),
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Set an absolute deadline.
    #[must_use]
    pub const fn with_deadline_ms(mut self, deadline_ms: u128) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Set the runtime estimate.
    #[must_use]
    pub const fn with_estimated_duration_secs(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = Some(secs);
        self
    }

    /// Set the models to load.
    #[must_use]
    pub fn with_required_models(mut self, models: Vec<String>) -> Self {
        self.required_models = models;
        self
    }
}

/// Response to `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    /// New job id.
    pub job_id: JobId,
    /// `queued` or `processing`.
    pub status: JobStatus,
}

/// Response to `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Job identifier.
    pub job_id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Progress in `[0, 1]` while processing or completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Result of a completed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,
    /// Error of a failed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timing figures of a terminal job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<JobMetrics>,
}

/// Response to `cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelJobResponse {
    /// Job identifier.
    pub job_id: JobId,
    /// Status after the call; a job already terminal keeps its status.
    pub status: JobStatus,
}

/// Response to `retry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryJobResponse {
    /// Id of the new job.
    pub job_id: JobId,
    /// Failed job that was retried.
    pub retried_from: JobId,
    /// `queued` or `processing`.
    pub status: JobStatus,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Registered job types.
    pub job_types: Vec<String>,
}
