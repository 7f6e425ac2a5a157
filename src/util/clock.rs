//! Time sources in milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Source of the current time for scheduling decisions.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u128;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u128 {
        now_ms()
    }
}

/// Manually advanced clock, for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<u128>,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub const fn new(start_ms: u128) -> Self {
        Self {
            now: Mutex::new(start_ms),
        }
    }

    /// Move the clock forward.
    pub fn advance_ms(&self, delta_ms: u128) {
        *self.now.lock() += delta_ms;
    }

    /// Move the clock forward by whole minutes.
    pub fn advance_mins(&self, mins: u64) {
        self.advance_ms(u128::from(mins) * 60_000);
    }

    /// Jump to an absolute time.
    pub fn set_ms(&self, now_ms: u128) {
        *self.now.lock() = now_ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u128 {
        *self.now.lock()
    }
}
