//! Stall detection for the compiler.

use std::time::Duration;

use tokio::time::Instant;

/// A single-shot deadline. Like the edit queue, it only records when it
/// would fire; the owner sleeps until [`Watchdog::deadline`].
pub(crate) struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Start (or restart) the countdown from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    /// Start the countdown unless it is already running.
    pub fn arm_if_idle(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.arm(now);
        }
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }
}
