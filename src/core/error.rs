//! Error types for scheduler operations.

use std::any::Any;

use thiserror::Error;

use crate::core::JobStatus;
use crate::util::serde::JobId;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Submission is malformed or names an unknown job type.
    #[error("validation error: {0}")]
    Validation(String),
    /// No job with this identifier exists.
    #[error("job not found: {0}")]
    NotFound(JobId),
    /// Retry was requested for a job that has not failed.
    #[error("retry only allowed from failed state: job {job_id} is {status}")]
    RetryOnlyFromFailed {
        /// Job the retry was requested for.
        job_id: JobId,
        /// Status the job was found in.
        status: JobStatus,
    },
    /// A lifecycle transition not permitted by the state machine.
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        /// Job being transitioned.
        job_id: JobId,
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },
    /// Queue is at its configured depth.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// Job requirements exceed the pool's total capacity.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
    /// A resource operation would break `0 <= available <= total`.
    #[error("resource invariant violated: {0}")]
    InvariantViolation(String),
    /// Failure reported by a [`JobStore`](crate::core::JobStore) or
    /// [`JobQueue`](crate::core::JobQueue) backend. The in-memory backends
    /// never fail; durable implementations map their I/O errors here.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Failure reported by a processor. Stored on the job as its `error` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessorError {
    /// Human-readable failure message.
    pub message: String,
}

impl ProcessorError {
    /// Create an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Convert a panic payload captured at the dispatch boundary.
    pub fn from_panic(panic: &(dyn Any + Send)) -> Self {
        let detail = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::new(format!("processor panicked: {detail}"))
    }
}

impl From<anyhow::Error> for ProcessorError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_error_from_anyhow_keeps_context() {
        let err = anyhow::anyhow!("model unavailable").context("scoring batch");
        let perr = ProcessorError::from(err);
        assert_eq!(perr.message, "scoring batch: model unavailable");
    }

    #[test]
    fn processor_error_from_panic_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(
            ProcessorError::from_panic(boxed.as_ref()).message,
            "processor panicked: boom"
        );
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bad frame"));
        assert_eq!(
            ProcessorError::from_panic(boxed.as_ref()).message,
            "processor panicked: bad frame"
        );
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert!(ProcessorError::from_panic(boxed.as_ref())
            .message
            .contains("unknown panic payload"));
    }
}
