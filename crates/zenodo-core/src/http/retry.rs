//! Retry classification and backoff scheduling
//!
//! Decides which upstream statuses deserve another attempt and how long to
//! wait before making it. The loop that acts on these decisions lives in
//! [`crate::http::client`].

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::http::auth::AuthenticationState;
use crate::http::rate_limit::RateLimitSnapshot;

/// Upper bound (exclusive) of the random jitter added to generic backoff
pub const MAX_JITTER: Duration = Duration::from_millis(1000);

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Base delay for backoff
    pub base_delay: Duration,
    /// Double the base delay on every retry when true, keep it flat otherwise
    pub use_exponential_backoff: bool,
    /// Honour the rate-limit headers on 429 responses
    pub respect_rate_limit: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            use_exponential_backoff: true,
            respect_rate_limit: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom retry budget
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.use_exponential_backoff = enabled;
        self
    }

    pub fn with_respect_rate_limit(mut self, enabled: bool) -> Self {
        self.respect_rate_limit = enabled;
        self
    }

    /// Total number of network attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `attempt + 1`, without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        if self.use_exponential_backoff {
            let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        }
    }
}

/// What to do with a response whose status did not match the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient upstream failure, retry without side effects
    Retry,
    /// Possibly spurious 401/403: verify the credential, then retry unless
    /// verification itself fails
    VerifyThenRetry,
    /// Give up immediately
    NoRetry,
}

impl RetryDecision {
    /// Classify a status code against the current authentication state
    pub fn classify(status: u16, auth_state: AuthenticationState) -> Self {
        match status {
            408 | 429 | 500..=599 => RetryDecision::Retry,
            401 | 403 => match auth_state {
                AuthenticationState::Failed => RetryDecision::NoRetry,
                AuthenticationState::NotTried | AuthenticationState::Succeeded => {
                    RetryDecision::VerifyThenRetry
                }
            },
            _ => RetryDecision::NoRetry,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, RetryDecision::NoRetry)
    }
}

/// Why the loop is about to sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayReason {
    /// Server told us when the quota resets
    RateLimit,
    /// Generic retryable status
    Backoff,
}

/// Compute the wait before the next attempt
///
/// `status` is `None` for transport faults, in which case rate-limit headers
/// cannot apply and the generic formula is used.
pub fn compute_delay(
    attempt: u32,
    status: Option<u16>,
    rate_limit: Option<&RateLimitSnapshot>,
    policy: &RetryPolicy,
) -> (Duration, DelayReason) {
    if status == Some(429) && policy.respect_rate_limit {
        if let Some(snapshot) = rate_limit {
            return (snapshot.wait_duration(), DelayReason::RateLimit);
        }
    }
    (policy.backoff(attempt) + jitter(), DelayReason::Backoff)
}

fn jitter() -> Duration {
    let millis = rand::thread_rng().gen_range(0..MAX_JITTER.as_millis() as u64);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert!(policy.use_exponential_backoff);
        assert!(policy.respect_rate_limit);
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        for status in [408u16, 429, 500, 502, 503, 504, 599] {
            assert_eq!(
                RetryDecision::classify(status, AuthenticationState::NotTried),
                RetryDecision::Retry,
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for status in [400u16, 404, 405, 409, 415, 422] {
            assert_eq!(
                RetryDecision::classify(status, AuthenticationState::Succeeded),
                RetryDecision::NoRetry,
                "status {}",
                status
            );
        }
    }

    #[test]
    fn test_auth_errors_depend_on_state() {
        for status in [401u16, 403] {
            assert_eq!(
                RetryDecision::classify(status, AuthenticationState::NotTried),
                RetryDecision::VerifyThenRetry
            );
            assert_eq!(
                RetryDecision::classify(status, AuthenticationState::Succeeded),
                RetryDecision::VerifyThenRetry
            );
            assert_eq!(
                RetryDecision::classify(status, AuthenticationState::Failed),
                RetryDecision::NoRetry
            );
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(100));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_exponential_backoff(false);
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(5), Duration::from_millis(100));
    }

    #[test]
    fn test_generic_delay_adds_bounded_jitter() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(100));
        for _ in 0..50 {
            let (delay, reason) = compute_delay(1, Some(500), None, &policy);
            assert_eq!(reason, DelayReason::Backoff);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(1200));
        }
    }

    #[test]
    fn test_rate_limit_delay_has_no_jitter() {
        let snapshot = RateLimitSnapshot {
            limit: 100,
            remaining: 0,
            reset_epoch_seconds: chrono::Utc::now().timestamp() + 5,
        };
        let (delay, reason) =
            compute_delay(0, Some(429), Some(&snapshot), &RetryPolicy::default());
        assert_eq!(reason, DelayReason::RateLimit);
        assert!(delay >= Duration::from_millis(5000));
        assert!(delay <= Duration::from_millis(6000));
    }

    #[test]
    fn test_rate_limit_ignored_when_disabled_or_unknown() {
        let snapshot = RateLimitSnapshot {
            limit: 100,
            remaining: 0,
            reset_epoch_seconds: 1_234_567_890,
        };
        let policy = RetryPolicy::default().with_respect_rate_limit(false);
        let (_, reason) = compute_delay(0, Some(429), Some(&snapshot), &policy);
        assert_eq!(reason, DelayReason::Backoff);

        let (_, reason) = compute_delay(0, Some(429), None, &RetryPolicy::default());
        assert_eq!(reason, DelayReason::Backoff);
    }

    #[test]
    fn test_network_faults_use_generic_formula() {
        let policy = RetryPolicy::default()
            .with_base_delay(Duration::from_millis(100))
            .with_exponential_backoff(false);
        let (delay, reason) = compute_delay(2, None, None, &policy);
        assert_eq!(reason, DelayReason::Backoff);
        assert!(delay >= Duration::from_millis(100));
        assert!(delay < Duration::from_millis(1100));
    }
}
