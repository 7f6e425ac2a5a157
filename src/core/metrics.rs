//! Metrics aggregation over job records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Job, JobStatus, ResourceClass};
use crate::util::serde::{Priority, ResourceVector};

/// Timing and resource figures for a single terminal job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    /// Milliseconds spent queued (zero when admitted immediately).
    pub queue_time_ms: u128,
    /// Milliseconds spent processing (zero when cancelled while queued).
    pub processing_time_ms: u128,
    /// Milliseconds from submission to terminal state.
    pub total_time_ms: u128,
    /// Resources the job held while processing.
    pub resource_usage: ResourceVector,
}

impl JobMetrics {
    /// Metrics for a terminal job, `None` otherwise.
    pub fn for_job(job: &Job) -> Option<Self> {
        if !job.status.is_terminal() {
            return None;
        }
        Some(Self {
            queue_time_ms: job.queue_time_ms().unwrap_or(0),
            processing_time_ms: job.processing_time_ms().unwrap_or(0),
            total_time_ms: job.total_time_ms().unwrap_or(0),
            resource_usage: job.resources.clone().unwrap_or_default(),
        })
    }
}

/// System-wide snapshot returned by `metrics()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Time the snapshot was taken.
    pub generated_at_ms: u128,
    /// Length of the trailing window in seconds.
    pub window_secs: u64,
    /// Jobs created inside the window, by status.
    pub jobs_by_status: BTreeMap<JobStatus, usize>,
    /// Mean `processing_started - queue_entered` over jobs that queued.
    pub avg_queue_time_ms: Option<f64>,
    /// Mean processing time over completed and failed jobs.
    pub avg_processing_time_ms: Option<f64>,
    /// `completed / (completed + failed)`, `None` with no finished jobs.
    pub success_rate: Option<f64>,
    /// Current `(total - available) / total` per resource class.
    pub utilization: BTreeMap<String, f64>,
    /// Current `{total, available}` per resource class.
    pub resources: BTreeMap<String, ResourceClass>,
    /// Current queue depth.
    pub queue_depth: usize,
    /// Current queue depth by priority.
    pub queue_depth_by_priority: BTreeMap<Priority, usize>,
    /// Jobs currently processing.
    pub active_jobs: usize,
}

/// Live state that is not derivable from records.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    /// Pool capacity per class.
    pub resources: BTreeMap<String, ResourceClass>,
    /// Pool utilization per class.
    pub utilization: BTreeMap<String, f64>,
    /// Queue depth by priority.
    pub queue_depth_by_priority: BTreeMap<Priority, usize>,
    /// Jobs currently processing.
    pub active_jobs: usize,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[u128]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: u128 = values.iter().sum();
    Some(sum as f64 / values.len() as f64)
}

/// Build a snapshot over the trailing `window_secs` ending at `now_ms`.
///
/// Terminal jobs count when they reached their terminal state inside the
/// window, however long ago they were created. Queued and processing jobs
/// always count.
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(records: &[Job], live: LiveState, window_secs: u64, now_ms: u128) -> MetricsSnapshot {
    let window_start = now_ms.saturating_sub(u128::from(window_secs) * 1000);
    let in_window: Vec<&Job> = records
        .iter()
        .filter(|j| j.terminal_at_ms().is_none_or(|at| at >= window_start))
        .collect();

    let mut jobs_by_status = BTreeMap::new();
    for job in &in_window {
        *jobs_by_status.entry(job.status).or_insert(0) += 1;
    }

    let queue_times: Vec<u128> = in_window.iter().filter_map(|j| j.queue_time_ms()).collect();
    let processing_times: Vec<u128> = in_window
        .iter()
        .filter(|j| matches!(j.status, JobStatus::Completed | JobStatus::Failed))
        .filter_map(|j| j.processing_time_ms())
        .collect();

    let completed = jobs_by_status.get(&JobStatus::Completed).copied().unwrap_or(0);
    let failed = jobs_by_status.get(&JobStatus::Failed).copied().unwrap_or(0);
    let success_rate = if completed + failed == 0 {
        None
    } else {
        Some(completed as f64 / (completed + failed) as f64)
    };

    MetricsSnapshot {
        generated_at_ms: now_ms,
        window_secs,
        jobs_by_status,
        avg_queue_time_ms: mean(&queue_times),
        avg_processing_time_ms: mean(&processing_times),
        success_rate,
        utilization: live.utilization,
        resources: live.resources,
        queue_depth: live.queue_depth_by_priority.values().sum(),
        queue_depth_by_priority: live.queue_depth_by_priority,
        active_jobs: live.active_jobs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NewJob;
    use crate::util::serde::COMPUTE;

    fn make_job(created: u128) -> Job {
        Job::new(
            NewJob {
                job_type: "recommendation_batch".into(),
                priority: Priority::Medium,
                payload: serde_json::Value::Null,
                required_models: Vec::new(),
                required_resources: ResourceVector::new().with(COMPUTE, 2),
                estimated_duration_secs: 60,
                deadline_ms: None,
                retry_of: None,
            },
            0,
            created,
        )
    }

    #[test]
    fn averages_and_success_rate() {
        let now = 10_000_000;
        let mut a = make_job(now - 5_000);
        a.mark_enqueued(now - 5_000).unwrap();
        a.admit(now - 4_000, ResourceVector::new().with(COMPUTE, 2)).unwrap();
        a.complete(now - 1_000, serde_json::json!(1)).unwrap();

        let mut b = make_job(now - 3_000);
        b.admit(now - 3_000, ResourceVector::new().with(COMPUTE, 2)).unwrap();
        b.fail(now - 2_000, "boom").unwrap();

        let mut c = make_job(now - 2_500);
        c.mark_enqueued(now - 2_500).unwrap();
        c.admit(now - 500, ResourceVector::new()).unwrap();

        let snap = aggregate(&[a, b, c], LiveState::default(), 3600, now);
        // a queued 1000ms, c queued 2000ms; b never queued
        assert_eq!(snap.avg_queue_time_ms, Some(1_500.0));
        // a processed 3000ms, b 1000ms; c still processing
        assert_eq!(snap.avg_processing_time_ms, Some(2_000.0));
        assert_eq!(snap.success_rate, Some(0.5));
        assert_eq!(snap.jobs_by_status[&JobStatus::Processing], 1);
    }

    #[test]
    fn window_excludes_old_jobs() {
        let now = 100_000_000;
        let mut old = make_job(now - 7_200_000);
        old.admit(now - 7_200_000, ResourceVector::new()).unwrap();
        old.fail(now - 7_100_000, "x").unwrap();
        let fresh = make_job(now - 1_000);
        let snap = aggregate(&[old, fresh], LiveState::default(), 3600, now);
        assert_eq!(snap.success_rate, None);
        assert_eq!(snap.jobs_by_status.len(), 1);
        assert_eq!(snap.jobs_by_status[&JobStatus::Queued], 1);
    }

    #[test]
    fn long_job_finishing_inside_window_counts() {
        let now = 100_000_000;
        // Created two hours ago, finished a minute ago.
        let mut long = make_job(now - 7_200_000);
        long.admit(now - 7_200_000, ResourceVector::new()).unwrap();
        long.complete(now - 60_000, serde_json::json!(null)).unwrap();
        // Old queued job is still live state.
        let stale_queued = make_job(now - 9_000_000);

        let snap = aggregate(&[long, stale_queued], LiveState::default(), 3600, now);
        assert_eq!(snap.success_rate, Some(1.0));
        assert_eq!(snap.avg_processing_time_ms, Some(7_140_000.0));
        assert_eq!(snap.jobs_by_status[&JobStatus::Completed], 1);
        assert_eq!(snap.jobs_by_status[&JobStatus::Queued], 1);
    }

    #[test]
    fn queue_depth_sums_priorities() {
        let mut live = LiveState::default();
        live.queue_depth_by_priority.insert(Priority::Low, 2);
        live.queue_depth_by_priority.insert(Priority::Critical, 1);
        let snap = aggregate(&[], live, 60, 1_000);
        assert_eq!(snap.queue_depth, 3);
        assert_eq!(snap.avg_queue_time_ms, None);
    }

    #[test]
    fn job_metrics_only_for_terminal() {
        let mut job = make_job(0);
        assert!(JobMetrics::for_job(&job).is_none());
        job.cancel(250).unwrap();
        let m = JobMetrics::for_job(&job).unwrap();
        assert_eq!(m.queue_time_ms, 0);
        assert_eq!(m.processing_time_ms, 0);
        assert_eq!(m.total_time_ms, 250);
        assert!(m.resource_usage.is_zero());
    }
}
