//! Dynamic priority score for queued jobs.
//!
//! `score = (weight(priority) + aging) * boost`, where aging adds one point per
//! full minute queued and `boost` is 10 once the deadline is less than five
//! minutes away (or already passed), 1 otherwise.

use std::cmp::Ordering;

use crate::core::QueuedJob;

/// Milliseconds of queueing per aging point.
pub const AGING_INTERVAL_MS: u128 = 60_000;
/// Deadline distance under which the boost applies.
pub const DEADLINE_BOOST_WINDOW_MS: u128 = 5 * 60_000;
/// Multiplier applied inside the deadline window.
pub const DEADLINE_BOOST_FACTOR: u64 = 10;

/// One point per full minute spent queued. Grows without bound.
pub fn aging_bonus(queue_entered_at_ms: u128, now_ms: u128) -> u64 {
    let minutes = now_ms.saturating_sub(queue_entered_at_ms) / AGING_INTERVAL_MS;
    u64::try_from(minutes).unwrap_or(u64::MAX)
}

/// Multiplier for jobs whose deadline is near.
pub fn deadline_multiplier(deadline_ms: Option<u128>, now_ms: u128) -> u64 {
    match deadline_ms {
        Some(deadline) if deadline.saturating_sub(now_ms) < DEADLINE_BOOST_WINDOW_MS => {
            DEADLINE_BOOST_FACTOR
        }
        _ => 1,
    }
}

/// Score of a queued job at `now_ms`.
pub fn score(job: &QueuedJob, now_ms: u128) -> u64 {
    job.priority
        .weight()
        .saturating_add(aging_bonus(job.queue_entered_at_ms, now_ms))
        .saturating_mul(deadline_multiplier(job.deadline_ms, now_ms))
}

/// Admission order: higher score first, then lower sequence.
pub fn admission_order(a: &QueuedJob, b: &QueuedJob, now_ms: u128) -> Ordering {
    score(b, now_ms)
        .cmp(&score(a, now_ms))
        .then_with(|| a.sequence.cmp(&b.sequence))
}
