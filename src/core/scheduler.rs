//! Job scheduler: admission control, scheduling passes, dispatch and
//! lifecycle bookkeeping.
//!
//! All mutable state (resource pool, queue, job store, running set) lives in
//! one `SchedulerState` behind a single `parking_lot::Mutex`. Every
//! decision that reads availability and reserves resources happens inside
//! one critical section, so the pool invariant holds under any number of
//! concurrent callers and processor completions. Processors run outside the
//! lock on the configured [`Spawn`] runtime.
//!
//! The state is per-process. Running several scheduler instances against the
//! same physical resources needs one authoritative instance (or a
//! transactional store implementing [`JobStore`] plus an external lock), not
//! several independent pools.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::core::audit::action;
use crate::core::dispatch::{invoke, Dispatch};
use crate::core::metrics::{aggregate, LiveState};
use crate::core::{
    build_audit_event, AuditSink, Job, JobMetrics, JobQueue, JobStatus, JobStore, MetricsSnapshot,
    NewJob, ProcessContext, ProcessorError, ProcessorRegistry, QueuedJob, ResourceClass,
    ResourceEstimator, ResourcePool, SchedulerError, Spawn,
};
use crate::runtime::api::{
    CancelJobResponse, Health, JobStatusResponse, RetryJobResponse, SubmitJobRequest,
    SubmitJobResponse,
};
use crate::util::clock::Clock;
use crate::util::serde::{JobId, Payload, ResourceVector};

/// Scheduler tunables.
#[derive(Debug, Clone)]
pub struct SchedulerLimits {
    /// Trailing window for aggregate metrics.
    pub metrics_window: Duration,
    /// Grace after a deadline before a processing job is force-failed.
    /// `None` leaves deadlines advisory.
    pub deadline_grace: Option<Duration>,
}

impl Default for SchedulerLimits {
    fn default() -> Self {
        Self {
            metrics_window: Duration::from_secs(24 * 60 * 60),
            deadline_grace: None,
        }
    }
}

/// Bookkeeping for a job holding resources.
#[derive(Debug)]
struct RunningJob {
    resources: ResourceVector,
    deadline_ms: Option<u128>,
    cancellation: CancellationToken,
}

/// Single authoritative mutable state.
struct SchedulerState<Q, St> {
    pool: ResourcePool,
    queue: Q,
    store: St,
    running: HashMap<JobId, RunningJob>,
    next_sequence: u64,
}

impl<Q, St> SchedulerState<Q, St> {
    fn held_total(&self) -> ResourceVector {
        let mut held = ResourceVector::new();
        for job in self.running.values() {
            for (class, units) in job.resources.iter() {
                held.set(class, held.get(class) + units);
            }
        }
        held
    }

    fn verify(&self) -> Result<(), SchedulerError> {
        self.pool.verify_held(&self.held_total())
    }
}

struct Inner<Q, St, Sp> {
    state: Mutex<SchedulerState<Q, St>>,
    registry: ProcessorRegistry,
    estimator: ResourceEstimator,
    limits: SchedulerLimits,
    clock: Arc<dyn Clock>,
    spawner: Sp,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
    shutdown: CancellationToken,
}

/// Priority- and deadline-aware job scheduler over a multi-class resource pool.
///
/// Cloning is cheap and every clone drives the same state.
pub struct JobScheduler<Q, St, Sp> {
    inner: Arc<Inner<Q, St, Sp>>,
}

impl<Q, St, Sp> Clone for JobScheduler<Q, St, Sp> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Q, St, Sp> std::fmt::Debug for JobScheduler<Q, St, Sp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler").finish_non_exhaustive()
    }
}

impl<Q, St, Sp> JobScheduler<Q, St, Sp>
where
    Q: JobQueue + Send + 'static,
    St: JobStore + Send + 'static,
    Sp: Spawn + Send + Sync + 'static,
{
    /// Create a scheduler from its components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: ResourcePool,
        queue: Q,
        store: St,
        registry: ProcessorRegistry,
        estimator: ResourceEstimator,
        limits: SchedulerLimits,
        clock: Arc<dyn Clock>,
        spawner: Sp,
        audit: Option<Box<dyn AuditSink>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState {
                    pool,
                    queue,
                    store,
                    running: HashMap::new(),
                    next_sequence: 0,
                }),
                registry,
                estimator,
                limits,
                clock,
                spawner,
                audit: audit.map(Mutex::new),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Submit a job.
    ///
    /// The job is admitted and dispatched immediately when the pool can hold
    /// it, otherwise it is queued.
    pub fn submit(&self, request: SubmitJobRequest) -> Result<SubmitJobResponse, SchedulerError> {
        let new_job = self.inner.validate(request)?;
        let (response, dispatch) = self.inner.admit_or_enqueue(new_job)?;
        if let Some(dispatch) = dispatch {
            self.inner.launch(vec![dispatch]);
        }
        Ok(response)
    }

    /// Current status, progress and (for terminal jobs) timing of a job.
    pub fn status(&self, job_id: &JobId) -> Result<JobStatusResponse, SchedulerError> {
        let job = self.job(job_id)?;
        let now = self.inner.clock.now_ms();
        Ok(JobStatusResponse {
            job_id: job.id,
            status: job.status,
            progress: job.progress(now),
            metrics: JobMetrics::for_job(&job),
            result: job.result,
            error: job.error,
        })
    }

    /// Full job record.
    pub fn job(&self, job_id: &JobId) -> Result<Job, SchedulerError> {
        let state = self.inner.state.lock();
        state
            .store
            .load(job_id)?
            .ok_or(SchedulerError::NotFound(*job_id))
    }

    /// Cancel a job.
    ///
    /// Queued jobs leave the queue without touching the pool. Processing jobs
    /// release their resources immediately and their processor is signalled
    /// through its cancellation token; the scheduler does not wait for it to
    /// stop. Cancelling a terminal job is a no-op reporting its status.
    pub fn cancel(&self, job_id: &JobId) -> Result<CancelJobResponse, SchedulerError> {
        let inner = &self.inner;
        let now = inner.clock.now_ms();
        let (response, dispatches) = {
            let mut guard = inner.state.lock();
            let state = &mut *guard;
            let mut job = state
                .store
                .load(job_id)?
                .ok_or(SchedulerError::NotFound(*job_id))?;

            match job.status {
                JobStatus::Queued => {
                    state.queue.remove(job_id);
                }
                JobStatus::Processing => {
                    if let Some(running) = state.running.remove(job_id) {
                        running.cancellation.cancel();
                        inner.release(state, job_id, &running.resources);
                    }
                }
                status => {
                    debug!(%job_id, %status, "cancel ignored for terminal job");
                    return Ok(CancelJobResponse {
                        job_id: *job_id,
                        status,
                    });
                }
            }

            job.cancel(now)?;
            state.store.save(&job)?;
            inner.record_audit(&job, action::CANCEL, None);
            info!(%job_id, job_type = %job.job_type, "job cancelled");
            let dispatches = inner.schedule_pass(state, now);
            (
                CancelJobResponse {
                    job_id: *job_id,
                    status: job.status,
                },
                dispatches,
            )
        };
        inner.launch(dispatches);
        Ok(response)
    }

    /// Resubmit a failed job as a new job with the same type, priority,
    /// payload, models, duration estimate and deadline.
    pub fn retry(&self, job_id: &JobId) -> Result<RetryJobResponse, SchedulerError> {
        let original = self.job(job_id)?;
        if original.status != JobStatus::Failed {
            return Err(SchedulerError::RetryOnlyFromFailed {
                job_id: *job_id,
                status: original.status,
            });
        }
        let (submitted, dispatch) = self.inner.admit_or_enqueue(original.to_new_job())?;
        self.inner.record_audit(
            &original,
            action::RETRY,
            Some(format!("retried as {}", submitted.job_id)),
        );
        info!(%job_id, new_job_id = %submitted.job_id, "failed job retried");
        if let Some(dispatch) = dispatch {
            self.inner.launch(vec![dispatch]);
        }
        Ok(RetryJobResponse {
            job_id: submitted.job_id,
            retried_from: *job_id,
            status: submitted.status,
        })
    }

    /// Aggregate metrics over the configured trailing window.
    pub fn metrics(&self) -> Result<MetricsSnapshot, SchedulerError> {
        let now = self.inner.clock.now_ms();
        let state = self.inner.state.lock();
        let records = state.store.list()?;
        let live = LiveState {
            resources: state.pool.snapshot(),
            utilization: state.pool.utilization(),
            queue_depth_by_priority: state.queue.depth_by_priority(),
            active_jobs: state.running.len(),
        };
        drop(state);
        Ok(aggregate(
            &records,
            live,
            self.inner.limits.metrics_window.as_secs(),
            now,
        ))
    }

    /// Per-class `{total, available}` snapshot.
    pub fn resources(&self) -> BTreeMap<String, ResourceClass> {
        self.inner.state.lock().pool.snapshot()
    }

    /// Check that held resources plus availability equal the totals for every class.
    pub fn verify_invariants(&self) -> Result<(), SchedulerError> {
        self.inner.state.lock().verify()
    }

    /// Health payload listing registered job types.
    pub fn health(&self) -> Health {
        Health {
            ok: !self.inner.shutdown.is_cancelled(),
            job_types: self.inner.registry.job_types(),
        }
    }

    /// Force-fail processing jobs whose deadline plus grace has passed.
    ///
    /// Returns the number of jobs failed. Does nothing when no grace is
    /// configured. Queued jobs are never failed by deadline.
    pub fn enforce_deadlines(&self) -> usize {
        let Some(grace) = self.inner.limits.deadline_grace else {
            return 0;
        };
        let inner = &self.inner;
        let now = inner.clock.now_ms();
        let grace_ms = grace.as_millis();
        let (expired, dispatches) = {
            let mut guard = inner.state.lock();
            let state = &mut *guard;
            let overdue: Vec<JobId> = state
                .running
                .iter()
                .filter(|(_, r)| r.deadline_ms.is_some_and(|d| now > d.saturating_add(grace_ms)))
                .map(|(id, _)| *id)
                .collect();
            for job_id in &overdue {
                if let Some(running) = state.running.remove(job_id) {
                    running.cancellation.cancel();
                    inner.release(state, job_id, &running.resources);
                    inner.finish_record(
                        state,
                        job_id,
                        now,
                        Err(ProcessorError::new("deadline exceeded")),
                        action::DEADLINE_EXCEEDED,
                    );
                    warn!(%job_id, "processing job force-failed past deadline");
                }
            }
            let dispatches = if overdue.is_empty() {
                Vec::new()
            } else {
                inner.schedule_pass(state, now)
            };
            (overdue.len(), dispatches)
        };
        inner.launch(dispatches);
        expired
    }

    /// Run [`enforce_deadlines`](Self::enforce_deadlines) every `interval`
    /// until `shutdown` fires.
    pub async fn run_watchdog(&self, interval: Duration, shutdown: CancellationToken) {
        if self.inner.limits.deadline_grace.is_none() {
            info!("deadline watchdog disabled: no grace configured");
            return;
        }
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let failed = self.enforce_deadlines();
                    if failed > 0 {
                        debug!(failed, "watchdog pass");
                    }
                }
            }
        }
        info!("deadline watchdog stopped");
    }

    /// Signal every running processor to stop. Job states are left as they
    /// are; processors that return afterwards are recorded normally.
    pub fn shutdown(&self) {
        info!("scheduler shutdown requested");
        self.inner.shutdown.cancel();
    }
}

impl<Q, St, Sp> Inner<Q, St, Sp>
where
    Q: JobQueue + Send + 'static,
    St: JobStore + Send + 'static,
    Sp: Spawn + Send + Sync + 'static,
{
    fn validate(&self, request: SubmitJobRequest) -> Result<NewJob, SchedulerError> {
        let job_type = request.job_type.trim().to_string();
        if job_type.is_empty() {
            return Err(SchedulerError::Validation("job type is required".into()));
        }
        if !self.registry.contains(&job_type) {
            return Err(SchedulerError::Validation(format!(
                "no processor registered for job type `{job_type}`"
            )));
        }
        let estimate = self.estimator.estimate(&job_type);
        Ok(NewJob {
            required_resources: estimate.resources.clone(),
            estimated_duration_secs: request
                .estimated_duration_secs
                .unwrap_or(estimate.estimated_duration_secs),
            job_type,
            priority: request.priority,
            payload: request.payload,
            required_models: request.required_models,
            deadline_ms: request.deadline_ms,
            retry_of: None,
        })
    }

    fn admit_or_enqueue(
        &self,
        new_job: NewJob,
    ) -> Result<(SubmitJobResponse, Option<Dispatch>), SchedulerError> {
        let now = self.clock.now_ms();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.pool.could_fit(&new_job.required_resources) {
            warn!(job_type = %new_job.job_type, "job rejected: requirements exceed pool capacity");
            return Err(SchedulerError::CapacityExceeded(format!(
                "job type `{}` requires {:?}, pool totals are {:?}",
                new_job.job_type,
                new_job.required_resources,
                state.pool.snapshot()
            )));
        }

        let sequence = state.next_sequence;
        let mut job = Job::new(new_job, sequence, now);

        if state.pool.try_allocate(&job.required_resources) {
            state.next_sequence += 1;
            let dispatch = self.admit(state, &mut job, now)?;
            self.record_audit(&job, action::SUBMIT, None);
            self.record_audit(&job, action::ADMIT, None);
            info!(job_id = %job.id, job_type = %job.job_type, "job started immediately");
            return Ok((
                SubmitJobResponse {
                    job_id: job.id,
                    status: job.status,
                },
                Some(dispatch),
            ));
        }

        if state.queue.len() >= state.queue.max_depth() {
            warn!(
                job_type = %job.job_type,
                depth = state.queue.len(),
                "job rejected: queue full"
            );
            return Err(SchedulerError::QueueFull("max queue depth reached".into()));
        }

        job.mark_enqueued(now)?;
        state.queue.enqueue(QueuedJob {
            job_id: job.id,
            priority: job.priority,
            deadline_ms: job.deadline_ms,
            queue_entered_at_ms: now,
            sequence,
            required_resources: job.required_resources.clone(),
        })?;
        state.next_sequence += 1;
        if let Err(e) = state.store.save(&job) {
            state.queue.remove(&job.id);
            return Err(e);
        }
        self.record_audit(&job, action::SUBMIT, None);
        self.record_audit(&job, action::ENQUEUE, None);
        info!(job_id = %job.id, job_type = %job.job_type, priority = %job.priority, "job enqueued");
        Ok((
            SubmitJobResponse {
                job_id: job.id,
                status: job.status,
            },
            None,
        ))
    }

    /// Transition a job whose resources are already reserved to Processing.
    fn admit(
        &self,
        state: &mut SchedulerState<Q, St>,
        job: &mut Job,
        now: u128,
    ) -> Result<Dispatch, SchedulerError> {
        let resources = job.required_resources.clone();
        let Some(processor) = self.registry.get(&job.job_type) else {
            self.release(state, &job.id, &resources);
            return Err(SchedulerError::Validation(format!(
                "no processor registered for job type `{}`",
                job.job_type
            )));
        };
        if let Err(e) = job.admit(now, resources.clone()).and_then(|()| state.store.save(job)) {
            self.release(state, &job.id, &resources);
            return Err(e);
        }

        let cancellation = self.shutdown.child_token();
        state.running.insert(
            job.id,
            RunningJob {
                resources: resources.clone(),
                deadline_ms: job.deadline_ms,
                cancellation: cancellation.clone(),
            },
        );
        self.check_invariants(state);

        Ok(Dispatch {
            job_id: job.id,
            payload: job.payload.clone(),
            processor,
            ctx: ProcessContext {
                job_id: job.id,
                job_type: job.job_type.clone(),
                priority: job.priority,
                required_models: job.required_models.clone(),
                resources,
                deadline_ms: job.deadline_ms,
                cancellation,
            },
        })
    }

    /// Admit every queued job that fits, in score order.
    ///
    /// Availability only shrinks during a pass, so a job skipped for not
    /// fitting can never fit later in the same pass; one ordered scan leaves
    /// no fittable job behind.
    fn schedule_pass(&self, state: &mut SchedulerState<Q, St>, now: u128) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();
        if state.queue.is_empty() {
            return dispatches;
        }
        for candidate in state.queue.ranked(now) {
            if !state.pool.try_allocate(&candidate.required_resources) {
                continue;
            }
            state.queue.remove(&candidate.job_id);
            let loaded = state.store.load(&candidate.job_id);
            let mut job = match loaded {
                Ok(Some(job)) => job,
                Ok(None) => {
                    error!(job_id = %candidate.job_id, "queued job missing from store; dropped");
                    self.release(state, &candidate.job_id, &candidate.required_resources);
                    continue;
                }
                Err(e) => {
                    error!(job_id = %candidate.job_id, error = %e, "failed to load queued job");
                    self.release(state, &candidate.job_id, &candidate.required_resources);
                    if let Err(e) = state.queue.enqueue(candidate) {
                        error!(error = %e, "failed to re-enqueue job");
                    }
                    continue;
                }
            };
            match self.admit(state, &mut job, now) {
                Ok(dispatch) => {
                    self.record_audit(&job, action::ADMIT, None);
                    info!(job_id = %job.id, job_type = %job.job_type, "queued job admitted");
                    dispatches.push(dispatch);
                }
                Err(e) => {
                    // The stored record is still Queued; keep it schedulable.
                    error!(job_id = %job.id, error = %e, "failed to admit queued job; re-enqueued");
                    if let Err(e) = state.queue.enqueue(candidate) {
                        error!(error = %e, "failed to re-enqueue job");
                    }
                }
            }
        }
        debug!(
            admitted = dispatches.len(),
            still_queued = state.queue.len(),
            "scheduling pass complete"
        );
        dispatches
    }

    /// Hand admitted jobs to their processors. Must be called without the
    /// state lock held.
    fn launch(self: &Arc<Self>, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            let inner = Arc::clone(self);
            let span = info_span!("job", job_id = %dispatch.job_id, job_type = %dispatch.ctx.job_type);
            self.spawner.spawn(
                async move {
                    let job_id = dispatch.job_id;
                    debug!("executing job");
                    let outcome = invoke(dispatch.processor, dispatch.payload, dispatch.ctx).await;
                    inner.on_processor_finished(job_id, outcome);
                }
                .instrument(span),
            );
        }
    }

    /// Record a processor outcome, release resources and re-run the pass.
    fn on_processor_finished(self: &Arc<Self>, job_id: JobId, outcome: Result<Payload, ProcessorError>) {
        let now = self.clock.now_ms();
        let dispatches = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(running) = state.running.remove(&job_id) else {
                // Cancelled or force-failed while running; resources already released.
                debug!(%job_id, "late processor outcome discarded");
                return;
            };
            self.release(state, &job_id, &running.resources);
            let act = if outcome.is_ok() {
                action::COMPLETE
            } else {
                action::FAIL
            };
            self.finish_record(state, &job_id, now, outcome, act);
            self.schedule_pass(state, now)
        };
        self.launch(dispatches);
    }

    /// Move a processing job to Completed or Failed and persist it.
    fn finish_record(
        &self,
        state: &mut SchedulerState<Q, St>,
        job_id: &JobId,
        now: u128,
        outcome: Result<Payload, ProcessorError>,
        act: &str,
    ) {
        let mut job = match state.store.load(job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                error!(%job_id, "finished job missing from store");
                return;
            }
            Err(e) => {
                error!(%job_id, error = %e, "failed to load finished job");
                return;
            }
        };
        let transition = match outcome {
            Ok(result) => {
                info!(%job_id, job_type = %job.job_type, "job completed");
                job.complete(now, result)
            }
            Err(err) => {
                warn!(%job_id, job_type = %job.job_type, error = %err, "job failed");
                job.fail(now, err.message)
            }
        };
        if let Err(e) = transition {
            error!(%job_id, error = %e, "invalid terminal transition");
            return;
        }
        if let Err(e) = state.store.save(&job) {
            error!(%job_id, error = %e, "failed to persist terminal job record");
        }
        self.record_audit(&job, act, job.error.clone());
    }

    fn release(&self, state: &mut SchedulerState<Q, St>, job_id: &JobId, resources: &ResourceVector) {
        if let Err(e) = state.pool.release(resources) {
            error!(%job_id, error = %e, "resource release rejected");
        }
        self.check_invariants(state);
    }

    fn check_invariants(&self, state: &SchedulerState<Q, St>) {
        if let Err(e) = state.verify() {
            error!(error = %e, "resource pool invariant violated");
        }
    }

    fn record_audit(&self, job: &Job, act: &str, detail: Option<String>) {
        if let Some(sink) = &self.audit {
            sink.lock()
                .record(build_audit_event(job.id, job.job_type.clone(), act, detail));
        }
    }
}
