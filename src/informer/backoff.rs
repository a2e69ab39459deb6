use std::time::Duration;

use kube::error::ErrorResponse;

use super::config;

/// How a failed list/watch operation should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The resource type is gone from the cluster. Never retried.
    Terminal,
    /// The resume cursor is too stale to continue from (HTTP 410). Forces a
    /// fresh list instead of a blind resume.
    Expired,
    /// Network reset, 5xx and friends. Retried with backoff.
    Transient,
}

impl FailureKind {
    /// Classify a kube client failure.
    #[must_use]
    pub fn classify(err: &kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => Self::classify_response(response),
            _ => Self::Transient,
        }
    }

    /// Classify a status record received in-stream.
    #[must_use]
    pub fn classify_response(response: &ErrorResponse) -> Self {
        match response.code {
            404 => Self::Terminal,
            410 => Self::Expired,
            _ => Self::Transient,
        }
    }
}

/// Pure retry policy: attempt count to delay, attempt count to give-up.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(config::BASE_BACKOFF_MILLIS),
            cap: Duration::from_millis(config::MAX_BACKOFF_MILLIS),
            max_attempts: config::MAX_WATCH_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^attempt, cap)`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(31)).min(self.cap)
    }

    /// True once `attempt` consecutive transient failures have occurred.
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
