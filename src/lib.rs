//! # Prometheus Job Scheduler
//!
//! A priority- and deadline-aware job scheduler for AI workloads sharing a
//! fixed pool of compute, memory and accelerator units.
//!
//! Jobs are submitted with a type and priority. Each type maps to a resource
//! estimate and a registered [`Processor`](core::Processor). A job that fits
//! the free resources starts immediately; otherwise it waits in a queue
//! ordered by a dynamic score:
//!
//! - **Priority weight**: critical 1000, high 100, medium 10, low 1
//! - **Aging**: +1 for every full minute spent queued, so nothing starves
//! - **Deadline boost**: ×10 once a deadline is less than five minutes away
//!
//! Whenever resources are released the queue is re-scanned in score order and
//! every job that fits is admitted, so a large job at the head never blocks
//! smaller jobs behind it (backfill).
//!
//! Resource accounting is all-or-nothing: a job holds all of its requirement
//! or none of it, and held plus available always equals the configured total.
//!
//! ```rust,ignore
//! use prometheus_job_scheduler::builders::SchedulerBuilder;
//! use prometheus_job_scheduler::config::SchedulerConfig;
//! use prometheus_job_scheduler::runtime::{SubmitJobRequest, TokioSpawner};
//! use prometheus_job_scheduler::util::serde::Priority;
//!
//! let scheduler = SchedulerBuilder::new(SchedulerConfig::from_env()?)
//!     .with_processor("video_analysis", VideoAnalysis::new())
//!     .build(TokioSpawner::current())?;
//!
//! let submitted = scheduler.submit(
//!     SubmitJobRequest::new("video_analysis")
//!         .with_priority(Priority::High)
//!         .with_payload(serde_json::json!({"video_id": "abc"})),
//! )?;
//! let status = scheduler.status(&submitted.job_id)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for the resource pool, estimates and timeouts.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Infrastructure adapters for queues and job record storage.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
