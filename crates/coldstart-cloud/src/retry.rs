//! Bounded fixed-delay retry policies for the orchestrator's poll loops.

use std::time::Duration;

/// A bounded polling budget: at most `attempts` tries, `delay` apart.
///
/// The policy is plain data so tests can shrink the delays to
/// milliseconds; the loop itself lives with the caller, which decides
/// what counts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Boot readiness budget: 10 attempts x 30s, a 5 minute ceiling.
    pub const fn boot_poll() -> Self {
        Self::new(10, Duration::from_secs(30))
    }

    /// Game readiness budget: 20 attempts x 15s, a 5 minute ceiling.
    pub const fn game_poll() -> Self {
        Self::new(20, Duration::from_secs(15))
    }

    /// Total wall-clock ceiling of this budget.
    pub fn ceiling(&self) -> Duration {
        self.delay * self.attempts
    }
}
