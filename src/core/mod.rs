//! Core scheduling abstractions: jobs, resources, queue ordering, processors
//! and the scheduler that ties them together.

pub mod audit;
pub mod dispatch;
pub mod error;
pub mod estimation;
pub mod job;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod resource_pool;
pub mod scheduler;
pub mod scoring;
pub mod store;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink};
pub use dispatch::{Dispatch, Spawn};
pub use error::{AppResult, ProcessorError, SchedulerError};
pub use estimation::{ResourceEstimate, ResourceEstimator};
pub use job::{Job, JobStatus, NewJob};
pub use metrics::{JobMetrics, LiveState, MetricsSnapshot};
pub use processor::{ProcessContext, Processor, ProcessorRegistry};
pub use queue::{JobQueue, QueuedJob};
pub use resource_pool::{ResourceClass, ResourcePool};
pub use scheduler::{JobScheduler, SchedulerLimits};
pub use store::JobStore;
