//! Audit sink implementations for job lifecycle events.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::clock::now_ms;
use crate::util::serde::JobId;

/// Lifecycle action recorded in the audit trail.
pub mod action {
    /// Job accepted.
    pub const SUBMIT: &str = "submit";
    /// Job placed in the queue.
    pub const ENQUEUE: &str = "enqueue";
    /// Resources reserved, processor dispatched.
    pub const ADMIT: &str = "admit";
    /// Processor succeeded.
    pub const COMPLETE: &str = "complete";
    /// Processor failed.
    pub const FAIL: &str = "fail";
    /// Job cancelled.
    pub const CANCEL: &str = "cancel";
    /// Failed job resubmitted.
    pub const RETRY: &str = "retry";
    /// Processing job force-failed by the watchdog.
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related job identifier.
    pub job_id: JobId,
    /// Job type.
    pub job_type: String,
    /// Action taken, one of the [`action`] constants.
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
///
/// Clones share one bounded buffer, so a handle kept by the caller sees
/// events recorded through the copy handed to the scheduler.
#[derive(Debug, Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    job_id: JobId,
    job_type: impl Into<String>,
    action: impl Into<String>,
    detail: Option<String>,
) -> AuditEvent {
    let action = action.into();
    let created_at_ms = now_ms();
    AuditEvent {
        event_id: format!("{job_id}-{action}-{created_at_ms}"),
        job_id,
        job_type: job_type.into(),
        action,
        created_at_ms,
        detail,
    }
}
