//! Shared fixtures for scheduler integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prometheus_job_scheduler::builders::SchedulerBuilder;
use prometheus_job_scheduler::config::{PoolConfig, SchedulerConfig};
use prometheus_job_scheduler::core::{
    JobQueue, JobScheduler, JobStatus, JobStore, ProcessContext, Processor, ProcessorError, Spawn,
};
use prometheus_job_scheduler::infra::{InMemoryJobStore, InMemoryQueue};
use prometheus_job_scheduler::util::clock::Clock;
use prometheus_job_scheduler::util::serde::{JobId, Payload, ACCELERATOR, COMPUTE, MEMORY};
use serde_json::json;
use tokio::sync::Notify;

/// Scheduler type used across the integration tests.
pub type TestScheduler = JobScheduler<InMemoryQueue, InMemoryJobStore, TestSpawner>;

/// Job types registered by [`scheduler`].
pub const JOB_TYPES: [&str; 4] = [
    "video_analysis",
    "model_training",
    "recommendation_batch",
    "thumbnail",
];

// Simple tokio spawner for tests
#[derive(Clone)]
pub struct TestSpawner;

impl Spawn for TestSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(fut);
    }
}

/// Processor that blocks each job until the test releases it by name.
///
/// Payload shape: `{"name": "...", "fail": bool, "panic": bool}`.
#[derive(Clone, Default)]
pub struct GatedProcessor {
    gates: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
    started: Arc<Mutex<Vec<String>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl GatedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self, name: &str) -> Arc<Notify> {
        Arc::clone(
            self.gates
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    /// Let the job named `name` finish. Safe to call before it starts.
    pub fn release(&self, name: &str) {
        self.gate(name).notify_one();
    }

    /// Names of jobs whose processor has started, in start order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    /// Names of jobs that observed their cancellation token.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }

    /// Wait until `name` has started.
    pub async fn wait_started(&self, name: &str) {
        for _ in 0..500 {
            if self.started.lock().iter().any(|n| n == name) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job `{name}` never started; started = {:?}", self.started());
    }

    /// Wait until `name` has observed cancellation.
    pub async fn wait_cancelled(&self, name: &str) {
        for _ in 0..500 {
            if self.cancelled.lock().iter().any(|n| n == name) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job `{name}` never observed cancellation");
    }
}

#[async_trait]
impl Processor for GatedProcessor {
    async fn process(&self, payload: Payload, ctx: ProcessContext) -> Result<Payload, ProcessorError> {
        let name = payload["name"].as_str().unwrap_or_default().to_string();
        let gate = self.gate(&name);
        self.started.lock().push(name.clone());

        tokio::select! {
            () = gate.notified() => {}
            () = ctx.cancellation.cancelled() => {
                self.cancelled.lock().push(name.clone());
                return Err(ProcessorError::new("cancelled"));
            }
        }

        if payload["panic"].as_bool().unwrap_or(false) {
            panic!("processor blew up on {name}");
        }
        if payload["fail"].as_bool().unwrap_or(false) {
            return Err(ProcessorError::new(format!("{name} failed")));
        }
        Ok(json!({"name": name, "job_type": ctx.job_type}))
    }
}

pub fn init_tracing() {
    prometheus_job_scheduler::util::init_tracing("prometheus_job_scheduler=debug");
}

/// Config with the given pool and queue depth.
pub fn config(compute: u64, memory: u64, accelerator: u64, max_queue_depth: usize) -> SchedulerConfig {
    SchedulerConfig {
        pool: PoolConfig {
            resources: [(COMPUTE, compute), (MEMORY, memory), (ACCELERATOR, accelerator)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            max_queue_depth,
        },
        ..SchedulerConfig::default()
    }
}

/// Builder with `processor` registered for every name in [`JOB_TYPES`].
pub fn builder(cfg: SchedulerConfig, processor: &GatedProcessor) -> SchedulerBuilder {
    JOB_TYPES
        .iter()
        .fold(SchedulerBuilder::new(cfg), |b, job_type| {
            b.with_processor(*job_type, processor.clone())
        })
}

/// Scheduler over `cfg` using the system clock.
pub fn scheduler(cfg: SchedulerConfig, processor: &GatedProcessor) -> TestScheduler {
    init_tracing();
    builder(cfg, processor).build(TestSpawner).unwrap()
}

/// Scheduler over `cfg` driven by `clock`.
pub fn scheduler_with_clock(
    cfg: SchedulerConfig,
    processor: &GatedProcessor,
    clock: Arc<dyn Clock>,
) -> TestScheduler {
    init_tracing();
    builder(cfg, processor)
        .with_clock(clock)
        .build(TestSpawner)
        .unwrap()
}

pub fn named(name: &str) -> Payload {
    json!({ "name": name })
}

/// Poll until the job reaches `expected`.
pub async fn wait_for_status<Q, St, S>(scheduler: &JobScheduler<Q, St, S>, job_id: &JobId, expected: JobStatus)
where
    Q: JobQueue + Send + 'static,
    St: JobStore + Send + 'static,
    S: Spawn + Send + Sync + 'static,
{
    let mut last = None;
    for _ in 0..500 {
        let status = scheduler.status(job_id).unwrap().status;
        if status == expected {
            return;
        }
        last = Some(status);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never reached {expected}; last status {last:?}");
}
