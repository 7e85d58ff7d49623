//! Retry policy and exponential backoff for polling loops.

use std::time::Duration;

/// Deadline and backoff bounds for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[must_use]
    pub const fn new(timeout: Duration, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            timeout,
            initial_backoff,
            max_backoff,
        }
    }

    /// Returns the overall timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a fresh backoff schedule.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_backoff, self.max_backoff)
    }
}

/// Doubling delay schedule capped at a maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a schedule starting at `initial` and capped at `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Returns the next delay, never longer than `remaining`.
    pub fn next_delay(&mut self, remaining: Duration) -> Duration {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.max);
        current.min(remaining)
    }
}
