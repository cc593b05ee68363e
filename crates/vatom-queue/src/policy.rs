//! Retry/backoff policy for failed jobs.

use std::time::Duration;

/// Default delays after the 1st, 2nd and 3rd+ failed attempt.
const DEFAULT_DELAYS: [Duration; 3] = [
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
];

/// What to do with a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue, eligible again after the delay.
    Retry(Duration),
    /// Attempts exhausted.
    Fail,
}

/// Per-job retry policy.
///
/// The delay grows with the number of attempts made so far and stays at the
/// last step once the schedule runs out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: DEFAULT_DELAYS.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with a custom delay schedule. An empty schedule retries immediately.
    pub fn with_delays(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Delay before the next attempt, given `attempts` already made.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let index = attempts.saturating_sub(1) as usize;
        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn decide(&self, attempts: u32, max_attempts: u32) -> RetryDecision {
        if attempts >= max_attempts {
            RetryDecision::Fail
        } else {
            RetryDecision::Retry(self.delay_for(attempts))
        }
    }
}
