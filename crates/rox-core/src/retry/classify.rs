//! Classify failure descriptors into retry classes.

use super::failure::{FailureDescriptor, SystemCode};
use super::policy::RetryPolicy;

/// Retry class of a single failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient; worth another attempt.
    Retryable,
    /// Deterministic; repeating the same call cannot succeed.
    NonRetryable,
    /// No rule matched. Retried like `Retryable` but logged separately.
    Unknown,
}

impl FailureClass {
    /// Whether the executor should spend another attempt on this class.
    pub fn allows_retry(self) -> bool {
        !matches!(self, FailureClass::NonRetryable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::Retryable => "retryable",
            FailureClass::NonRetryable => "non-retryable",
            FailureClass::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a failure for the given call-site policy.
///
/// Configured codes are consulted first (non-retryable wins over retryable),
/// then the built-in defaults. Total: unmatched descriptors are `Unknown`.
pub fn classify(failure: &FailureDescriptor, policy: &RetryPolicy) -> FailureClass {
    let token = failure.token();
    if policy.non_retryable_codes().contains(&token) {
        return FailureClass::NonRetryable;
    }
    if policy.retryable_codes().contains(&token) {
        return FailureClass::Retryable;
    }
    default_class(failure)
}

/// Built-in classification, used when the policy has no rule for the token.
pub fn default_class(failure: &FailureDescriptor) -> FailureClass {
    match failure {
        FailureDescriptor::Http(status) => classify_http_status(*status),
        FailureDescriptor::System(code) => classify_system_code(*code),
        FailureDescriptor::App(_) => FailureClass::Unknown,
    }
}

/// Client errors never succeed on an identical retry; server errors may.
pub fn classify_http_status(status: u16) -> FailureClass {
    match status {
        400..=499 => FailureClass::NonRetryable,
        500..=599 => FailureClass::Retryable,
        _ => FailureClass::Unknown,
    }
}

pub fn classify_system_code(code: SystemCode) -> FailureClass {
    match code {
        SystemCode::PermissionDenied | SystemCode::NotFound => FailureClass::NonRetryable,
        SystemCode::Busy
        | SystemCode::TooManyOpenFiles
        | SystemCode::TimedOut
        | SystemCode::ConnectionReset
        | SystemCode::ConnectionRefused
        | SystemCode::HostUnreachable
        | SystemCode::Interrupted
        | SystemCode::WouldBlock => FailureClass::Retryable,
        SystemCode::Os(_) | SystemCode::Other => FailureClass::Unknown,
    }
}
