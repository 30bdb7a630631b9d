//! Reconnect delay for notification listeners.

use std::time::Duration;

/// Exponential reconnect delay.
///
/// The delay starts at zero, becomes `initial` after the first failure and
/// doubles after every further failure, capped at `max`. A successful
/// reconnect resets it to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failure
    pub initial: Duration,
    /// Upper bound for the delay
    pub max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl Backoff {
    /// Creates a new backoff with a zero current delay.
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: Duration::ZERO,
        }
    }

    /// Returns the delay to wait before the next attempt.
    #[inline]
    pub fn delay(&self) -> Duration {
        self.current
    }

    /// Records a failure and returns the new delay.
    pub fn increase(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            self.initial.min(self.max)
        } else {
            self.current.saturating_mul(2).min(self.max)
        };
        self.current
    }

    /// Records a success.
    #[inline]
    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }
}
