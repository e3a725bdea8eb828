/// Retry policy shared by the link and session state machines
use std::time::Duration;

/// How a connect/open loop behaves between failed attempts.
///
/// The device has nothing useful to do while offline, so production uses
/// the unbounded policy: retry forever with a fixed pause. Bounded variants
/// exist so tests can observe loop termination.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const fn unbounded(backoff: Duration) -> Self {
        RetryPolicy {
            backoff,
            max_attempts: None,
        }
    }

    pub const fn bounded(backoff: Duration, max_attempts: u32) -> Self {
        RetryPolicy {
            backoff,
            max_attempts: Some(max_attempts),
        }
    }

    /// True when `attempts` failed attempts have used up the policy.
    pub fn exhausted(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts >= max,
            None => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::unbounded(Duration::from_secs(10))
    }
}
