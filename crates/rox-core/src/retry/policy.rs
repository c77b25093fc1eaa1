//! Retry policy value object and per-subsystem presets.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use super::failure::{INVALID_REQUEST, STALE_SOURCE};

/// Hard ceiling on any policy's `max_delay_ms`. Retry delays are never seconds.
pub const MAX_DELAY_CEILING_MS: u64 = 1_000;

/// Invalid policy or breaker configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("max_delay_ms {0} exceeds the 1000 ms ceiling")]
    DelayTooLarge(u64),
    #[error("failure_threshold must be at least 1")]
    ZeroThreshold,
}

/// Immutable retry configuration for one call site.
///
/// Delays grow linearly (`base + (attempt - 1) * step`) and are hard-capped
/// at `max_delay_ms`, so the worst-case added latency of a run is
/// `(max_attempts - 1) * max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    step_ms: u64,
    max_delay_ms: u64,
    jitter_ms: u64,
    retryable_codes: HashSet<String>,
    non_retryable_codes: HashSet<String>,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Interactive filesystem operations: a handful of quick retries for
    /// busy / handle-exhaustion errors, never more than 20 ms per wait.
    pub fn file_ops() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 5,
            step_ms: 5,
            max_delay_ms: 20,
            jitter_ms: 2,
            retryable_codes: HashSet::new(),
            non_retryable_codes: codes(&["permission-denied", "not-found"]),
        }
    }

    /// Network fetches: 5xx and connection faults retried, plus 408/429
    /// which are the only 4xx statuses worth repeating.
    pub fn network_fetch() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 50,
            step_ms: 50,
            max_delay_ms: 250,
            jitter_ms: 25,
            retryable_codes: codes(&["http-408", "http-429"]),
            non_retryable_codes: codes(&[INVALID_REQUEST]),
        }
    }

    /// Background refresh of a remote index cache.
    pub fn cache_refresh() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 25,
            step_ms: 25,
            max_delay_ms: 100,
            jitter_ms: 10,
            retryable_codes: codes(&[STALE_SOURCE]),
            non_retryable_codes: HashSet::new(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter_ms(&self) -> u64 {
        self.jitter_ms
    }

    pub fn retryable_codes(&self) -> &HashSet<String> {
        &self.retryable_codes
    }

    pub fn non_retryable_codes(&self) -> &HashSet<String> {
        &self.non_retryable_codes
    }

    /// Upper bound on total sleep across one run of this policy.
    pub fn worst_case_suspension(&self) -> Duration {
        let waits = u64::from(self.max_attempts.saturating_sub(1));
        Duration::from_millis(waits.saturating_mul(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::file_ops()
    }
}

fn codes(tokens: &[&str]) -> HashSet<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

/// Builder for [`RetryPolicy`]; `build` validates the bounds.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            policy: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 10,
                step_ms: 10,
                max_delay_ms: 50,
                jitter_ms: 0,
                retryable_codes: HashSet::new(),
                non_retryable_codes: HashSet::new(),
            },
        }
    }
}

impl RetryPolicyBuilder {
    /// Start from an existing policy (e.g. a preset) and override fields.
    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.policy.max_attempts = n;
        self
    }

    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.policy.base_delay_ms = ms;
        self
    }

    pub fn step_ms(mut self, ms: u64) -> Self {
        self.policy.step_ms = ms;
        self
    }

    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.policy.max_delay_ms = ms;
        self
    }

    pub fn jitter_ms(mut self, ms: u64) -> Self {
        self.policy.jitter_ms = ms;
        self
    }

    pub fn retryable(mut self, token: impl Into<String>) -> Self {
        self.policy.retryable_codes.insert(token.into());
        self
    }

    pub fn non_retryable(mut self, token: impl Into<String>) -> Self {
        self.policy.non_retryable_codes.insert(token.into());
        self
    }

    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        if self.policy.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if self.policy.max_delay_ms > MAX_DELAY_CEILING_MS {
            return Err(PolicyError::DelayTooLarge(self.policy.max_delay_ms));
        }
        Ok(self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_stay_under_ceiling() {
        for p in [
            RetryPolicy::file_ops(),
            RetryPolicy::network_fetch(),
            RetryPolicy::cache_refresh(),
        ] {
            assert!(p.max_attempts() >= 1);
            assert!(p.max_delay_ms() <= MAX_DELAY_CEILING_MS);
            assert!(p.jitter_ms() <= p.max_delay_ms());
        }
        assert!(RetryPolicy::file_ops().max_delay_ms() <= 20);
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let err = RetryPolicy::builder().max_attempts(0).build().unwrap_err();
        assert_eq!(err, PolicyError::ZeroAttempts);
    }

    #[test]
    fn builder_rejects_second_scale_delays() {
        let err = RetryPolicy::builder().max_delay_ms(30_000).build().unwrap_err();
        assert_eq!(err, PolicyError::DelayTooLarge(30_000));
    }

    #[test]
    fn builder_overrides_preset() {
        let p = RetryPolicyBuilder::from_policy(RetryPolicy::network_fetch())
            .max_attempts(2)
            .non_retryable("http-503")
            .build()
            .unwrap();
        assert_eq!(p.max_attempts(), 2);
        assert!(p.non_retryable_codes().contains("http-503"));
        assert!(p.retryable_codes().contains("http-429"));
    }

    #[test]
    fn worst_case_suspension_is_linear_in_attempts() {
        let p = RetryPolicy::builder()
            .max_attempts(4)
            .max_delay_ms(100)
            .build()
            .unwrap();
        assert_eq!(p.worst_case_suspension(), Duration::from_millis(300));
    }
}
