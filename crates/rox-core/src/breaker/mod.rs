//! Per-target circuit breaking.
//!
//! This module tracks, per target key (a host, a containing directory, a
//! cache index):
//! - consecutive failures, reset on any success
//! - Closed / Open / HalfOpen state and when it last opened
//!
//! The registry is an explicit value, created once by the caller and shared
//! with every executor, so tests can build isolated registries.

mod clock;
mod key;
mod registry;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::TargetKey;
pub use registry::{AttemptPermit, BreakerRegistry, BreakerSnapshot};
pub use state::{AttemptOutcome, BreakerSettings, CircuitState};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FailureClass;
    use std::time::Duration;

    const FAIL: AttemptOutcome = AttemptOutcome::Failure(FailureClass::Retryable);

    fn registry(threshold: u32, cooldown_ms: u64) -> (BreakerRegistry<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let settings = BreakerSettings::new(threshold, Duration::from_millis(cooldown_ms)).unwrap();
        (BreakerRegistry::with_clock(settings, clock.clone()), clock)
    }

    #[test]
    fn unknown_target_is_closed_and_created_lazily() {
        let (reg, _) = registry(2, 100);
        assert!(reg.snapshot("a").is_none());
        assert!(reg.should_attempt("a"));
        let snap = reg.snapshot("a").expect("created on first use");
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
    }

    #[test]
    fn targets_are_independent() {
        let (reg, _) = registry(1, 100);
        reg.record_outcome("a", FAIL);
        assert!(!reg.should_attempt("a"));
        assert!(reg.should_attempt("b"));
        assert_eq!(reg.targets(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn cooldown_then_probe_success_closes() {
        let (reg, clock) = registry(2, 100);
        reg.record_outcome("t", FAIL);
        reg.record_outcome("t", FAIL);
        assert!(!reg.should_attempt("t"));
        let snap = reg.snapshot("t").unwrap();
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.open_remaining, Some(Duration::from_millis(100)));

        clock.advance_millis(100);
        assert!(reg.should_attempt("t"));
        assert!(!reg.should_attempt("t"), "only one probe while half-open");
        assert_eq!(reg.snapshot("t").unwrap().state, CircuitState::HalfOpen);

        reg.record_outcome("t", AttemptOutcome::Success);
        let snap = reg.snapshot("t").unwrap();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
        assert!(reg.should_attempt("t"));
    }

    #[test]
    fn dropped_probe_permit_reopens_then_frees_target() {
        let (reg, clock) = registry(1, 100);
        reg.record_outcome("t", FAIL);
        clock.advance_millis(100);

        let probe = reg.try_acquire("t").expect("probe admitted");
        assert!(probe.is_probe());
        clock.advance_millis(500);
        assert!(reg.try_acquire("t").is_none(), "probe still in flight");

        drop(probe);
        let snap = reg.snapshot("t").unwrap();
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.consecutive_failures, 1);
        assert_eq!(snap.open_remaining, Some(Duration::from_millis(100)));

        clock.advance_millis(100);
        let probe = reg.try_acquire("t").expect("next probe after fresh cooldown");
        probe.record(AttemptOutcome::Success);
        assert_eq!(reg.snapshot("t").unwrap().state, CircuitState::Closed);
    }

    #[test]
    fn closed_permit_drop_changes_nothing() {
        let (reg, _) = registry(1, 100);
        let permit = reg.try_acquire("t").unwrap();
        assert!(!permit.is_probe());
        drop(permit);
        let snap = reg.snapshot("t").unwrap();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
    }

    #[test]
    fn per_target_override() {
        let (reg, _) = registry(5, 100);
        reg.configure("fragile", BreakerSettings::new(1, Duration::from_millis(100)).unwrap());
        reg.record_outcome("fragile", FAIL);
        reg.record_outcome("sturdy", FAIL);
        assert!(!reg.should_attempt("fragile"));
        assert!(reg.should_attempt("sturdy"));
    }

    #[test]
    fn reset_closes_open_target() {
        let (reg, _) = registry(1, 10_000);
        reg.record_outcome("t", FAIL);
        assert!(!reg.should_attempt("t"));
        reg.reset("t");
        assert!(reg.should_attempt("t"));
        assert_eq!(reg.snapshot("t").unwrap().consecutive_failures, 0);
    }
}
