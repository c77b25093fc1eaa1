//! Retry policy: failure descriptors, classification and backoff.
//!
//! This module holds the pure half of the executor. Collaborators turn their
//! errors into a [`FailureDescriptor`], the classifier maps it to a
//! [`FailureClass`] under a call-site [`RetryPolicy`], and the backoff schedule
//! turns an attempt number into a bounded delay.

mod backoff;
mod classify;
mod failure;
mod policy;

pub use backoff::{capped_delay_ms, delay_for, delay_for_with};
pub use classify::{classify, classify_http_status, classify_system_code, default_class, FailureClass};
pub use failure::{Describe, FailureDescriptor, SystemCode, INVALID_REQUEST, STALE_SOURCE};
pub use policy::{PolicyError, RetryPolicy, RetryPolicyBuilder, MAX_DELAY_CEILING_MS};
