//! Build a [`JobScheduler`] from [`SchedulerConfig`].

use std::sync::Arc;
use std::time::Duration;

use crate::config::SchedulerConfig;
use crate::core::{
    AuditSink, JobQueue, JobScheduler, JobStore, Processor, ProcessorRegistry, ResourceEstimator,
    ResourcePool, SchedulerError, SchedulerLimits, Spawn,
};
use crate::infra::{InMemoryJobStore, InMemoryQueue};
use crate::util::clock::{Clock, SystemClock};

/// Assembles a scheduler from configuration, processors and backends.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    registry: ProcessorRegistry,
    clock: Arc<dyn Clock>,
    audit: Option<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl SchedulerBuilder {
    /// Start from a configuration with no processors and the system clock.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            registry: ProcessorRegistry::new(),
            clock: Arc::new(SystemClock),
            audit: None,
        }
    }

    /// Register the processor for a job type.
    #[must_use]
    pub fn with_processor(mut self, job_type: impl Into<String>, processor: impl Processor) -> Self {
        self.registry.register(job_type, processor);
        self
    }

    /// Register a shared processor for a job type.
    #[must_use]
    pub fn with_shared_processor(
        mut self,
        job_type: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> Self {
        self.registry.register_shared(job_type, processor);
        self
    }

    /// Replace the clock used for timestamps, aging and deadlines.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record lifecycle events to `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Some(Box::new(sink));
        self
    }

    /// Build with the in-memory queue and job store.
    pub fn build<S>(
        self,
        spawner: S,
    ) -> Result<JobScheduler<InMemoryQueue, InMemoryJobStore, S>, SchedulerError>
    where
        S: Spawn + Send + Sync + 'static,
    {
        let depth = self.config.pool.max_queue_depth;
        self.build_with(InMemoryQueue::new(depth), InMemoryJobStore::new(), spawner)
    }

    /// Build with caller-provided queue and store backends.
    pub fn build_with<Q, St, S>(
        self,
        queue: Q,
        store: St,
        spawner: S,
    ) -> Result<JobScheduler<Q, St, S>, SchedulerError>
    where
        Q: JobQueue + Send + 'static,
        St: JobStore + Send + 'static,
        S: Spawn + Send + Sync + 'static,
    {
        let cfg = self.config;
        cfg.validate()
            .map_err(|e| SchedulerError::Validation(format!("config invalid: {e}")))?;
        if self.registry.job_types().is_empty() {
            tracing::warn!("scheduler built with no registered processors");
        }

        let estimator = cfg
            .estimates
            .into_iter()
            .fold(ResourceEstimator::default(), |est, (job_type, estimate)| {
                est.with_override(job_type, estimate)
            });
        let limits = SchedulerLimits {
            metrics_window: Duration::from_secs(cfg.metrics_window_secs),
            deadline_grace: cfg.deadline_grace_secs.map(Duration::from_secs),
        };
        let pool = ResourcePool::new(&cfg.pool.totals());

        tracing::info!(
            resources = ?cfg.pool.resources,
            max_queue_depth = cfg.pool.max_queue_depth,
            job_types = ?self.registry.job_types(),
            "scheduler built"
        );

        Ok(JobScheduler::new(
            pool,
            queue,
            store,
            self.registry,
            estimator,
            limits,
            self.clock,
            spawner,
            self.audit,
        ))
    }
}
