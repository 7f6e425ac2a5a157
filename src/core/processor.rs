//! Processor contract and the registry mapping job types to processors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::ProcessorError;
use crate::util::serde::{JobId, Payload, Priority, ResourceVector};

/// Context handed to a processor alongside the payload.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    /// Job being processed.
    pub job_id: JobId,
    /// Job type that selected this processor.
    pub job_type: String,
    /// Base priority of the job.
    pub priority: Priority,
    /// Models the job asked for.
    pub required_models: Vec<String>,
    /// Resources reserved for this run.
    pub resources: ResourceVector,
    /// Optional deadline in milliseconds since epoch.
    pub deadline_ms: Option<u128>,
    /// Cancelled when the job is cancelled, force-failed, or the scheduler
    /// shuts down.
    pub cancellation: CancellationToken,
}

impl ProcessContext {
    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Capability that performs the work for one job type.
///
/// Cancellation is cooperative. When a job is cancelled the scheduler
/// releases its resources immediately and fires `ctx.cancellation`; the
/// processor is expected to notice and stop. The scheduler never aborts a
/// running processor, so one that ignores the token keeps consuming real
/// resources after the pool has reclaimed them. Any value returned after
/// cancellation is discarded.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_job_scheduler::core::{ProcessContext, Processor, ProcessorError};
/// use prometheus_job_scheduler::util::Payload;
///
/// struct Thumbnailer;
///
/// #[async_trait]
/// impl Processor for Thumbnailer {
///     async fn process(&self, payload: Payload, ctx: ProcessContext) -> Result<Payload, ProcessorError> {
///         tokio::select! {
///             () = ctx.cancellation.cancelled() => Err(ProcessorError::new("cancelled")),
///             frames = render(payload) => Ok(frames),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Run the job and return its result, or an error recorded on the job.
    async fn process(&self, payload: Payload, ctx: ProcessContext) -> Result<Payload, ProcessorError>;
}

/// Registry of processors keyed by job type.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the processor for a job type.
    pub fn register(&mut self, job_type: impl Into<String>, processor: impl Processor) {
        self.processors.insert(job_type.into(), Arc::new(processor));
    }

    /// Register a processor already behind an `Arc`, sharing it between types.
    pub fn register_shared(&mut self, job_type: impl Into<String>, processor: Arc<dyn Processor>) {
        self.processors.insert(job_type.into(), processor);
    }

    /// Processor for a job type.
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(job_type).cloned()
    }

    /// Whether a processor is registered for the type.
    pub fn contains(&self, job_type: &str) -> bool {
        self.processors.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn job_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.processors.keys().cloned().collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("job_types", &self.job_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Processor for Echo {
        async fn process(&self, payload: Payload, _ctx: ProcessContext) -> Result<Payload, ProcessorError> {
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn registry_lookup_and_invoke() {
        let mut registry = ProcessorRegistry::new();
        registry.register("echo", Echo);
        assert!(registry.contains("echo"));
        assert!(!registry.contains("video_analysis"));
        assert_eq!(registry.job_types(), vec!["echo".to_string()]);

        let ctx = ProcessContext {
            job_id: uuid::Uuid::new_v4(),
            job_type: "echo".into(),
            priority: Priority::Low,
            required_models: Vec::new(),
            resources: ResourceVector::new(),
            deadline_ms: None,
            cancellation: CancellationToken::new(),
        };
        let out = registry
            .get("echo")
            .unwrap()
            .process(serde_json::json!({"x": 1}), ctx)
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"x": 1}));
    }
}
