//! Dispatch boundary between the scheduler and processors.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::core::{ProcessContext, Processor, ProcessorError};
use crate::util::serde::{JobId, Payload};

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// An admitted job ready to hand to its processor.
pub struct Dispatch {
    /// Job being dispatched.
    pub job_id: JobId,
    /// Opaque payload.
    pub payload: Payload,
    /// Processor resolved from the registry.
    pub processor: Arc<dyn Processor>,
    /// Context including the cancellation token.
    pub ctx: ProcessContext,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("job_id", &self.job_id)
            .field("job_type", &self.ctx.job_type)
            .finish_non_exhaustive()
    }
}

/// Run the processor, converting a panic into a [`ProcessorError`] so it can
/// never take down the task that reports the outcome.
pub async fn invoke(
    processor: Arc<dyn Processor>,
    payload: Payload,
    ctx: ProcessContext,
) -> Result<Payload, ProcessorError> {
    match AssertUnwindSafe(processor.process(payload, ctx))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => Err(ProcessorError::from_panic(panic.as_ref())),
    }
}
