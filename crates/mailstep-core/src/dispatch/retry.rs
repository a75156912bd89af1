//! Retry policy for mail sends.
//!
//! Stateless: the dispatcher tracks the attempt number and asks the policy
//! whether to go again and how long to wait first.

use std::time::Duration;

use mailstep_types::config::DispatchConfig;
use mailstep_types::error::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: config.base_backoff(),
            max_backoff: config.max_backoff(),
        }
    }

    /// Whether another attempt should follow failed attempt `attempt`.
    ///
    /// `attempt` is 1-based (first send is attempt 1).
    pub fn should_retry(&self, attempt: u32, error: &DeliveryError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Delay before the attempt following `attempt`: `base * 2^(attempt-1)`,
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(2000),
        }
    }

    fn server_error() -> DeliveryError {
        DeliveryError::Server {
            status: 503,
            message: "unavailable".into(),
        }
    }

    // -------------------------------------------------------------------
    // should_retry
    // -------------------------------------------------------------------

    #[test]
    fn test_should_retry_within_limit() {
        let policy = policy();
        assert!(policy.should_retry(1, &server_error()));
        assert!(policy.should_retry(2, &DeliveryError::Transport("reset".into())));
    }

    #[test]
    fn test_should_not_retry_at_limit() {
        let policy = policy();
        assert!(!policy.should_retry(3, &server_error()));
        assert!(!policy.should_retry(4, &server_error()));
    }

    #[test]
    fn test_should_not_retry_client_errors() {
        let policy = policy();
        let rejected = DeliveryError::Client {
            status: 422,
            message: "bad address".into(),
        };
        assert!(!policy.should_retry(1, &rejected));
        assert!(!policy.should_retry(1, &DeliveryError::MissingRecipient("ContactEmail".into())));
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..policy()
        };
        assert!(!policy.should_retry(1, &server_error()));
    }

    // -------------------------------------------------------------------
    // backoff
    // -------------------------------------------------------------------

    #[test]
    fn test_backoff_doubles() {
        let policy = policy();
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = policy();
        assert_eq!(policy.backoff(5), Duration::from_millis(2000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(2000));
    }

    #[test]
    fn test_from_config_clamps_zero_attempts() {
        let config = DispatchConfig {
            max_attempts: 0,
            ..DispatchConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_attempts, 1);
    }
}
