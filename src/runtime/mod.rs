//! Runtime adapters and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    CancelJobResponse, Health, JobStatusResponse, RetryJobResponse, SubmitJobRequest,
    SubmitJobResponse,
};
pub use tokio_spawner::TokioSpawner;
