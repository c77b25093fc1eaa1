//! Per-target circuit state machine.

use std::fmt;
use std::time::{Duration, Instant};

use crate::retry::{FailureClass, PolicyError};

/// Breaker state of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; attempts allowed.
    Closed,
    /// Tripped; attempts refused until the cooldown elapses.
    Open,
    /// Cooldown elapsed; a single probe attempt is in flight.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Result of one attempt as seen by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure(FailureClass),
}

/// Trip threshold and cooldown for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive failures that move Closed to Open.
    pub failure_threshold: u32,
    /// Time Open must last before a probe is admitted.
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(10),
        }
    }
}

impl BreakerSettings {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Result<Self, PolicyError> {
        if failure_threshold == 0 {
            return Err(PolicyError::ZeroThreshold);
        }
        Ok(Self {
            failure_threshold,
            cooldown,
        })
    }
}

/// Admission decision for one attempt request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Allowed,
    /// Allowed as the single HalfOpen probe, tagged with its epoch.
    Probe(u64),
    Rejected,
}

/// Mutable per-target breaker state. Always accessed under the target's lock.
#[derive(Debug, Clone)]
pub(crate) struct TargetState {
    pub(crate) settings: BreakerSettings,
    pub(crate) state: CircuitState,
    pub(crate) consecutive_failures: u32,
    pub(crate) opened_at: Option<Instant>,
    /// Bumped on every probe admission; identifies the probe in flight.
    probe_epoch: u64,
}

impl TargetState {
    pub(crate) fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_epoch: 0,
        }
    }

    pub(crate) fn admit(&mut self, now: Instant) -> Admission {
        match self.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                if self.cooldown_elapsed(now) {
                    self.state = CircuitState::HalfOpen;
                    self.probe_epoch = self.probe_epoch.wrapping_add(1);
                    Admission::Probe(self.probe_epoch)
                } else {
                    Admission::Rejected
                }
            }
            // The probe holds HalfOpen until it reports or is abandoned.
            CircuitState::HalfOpen => Admission::Rejected,
        }
    }

    /// Probe `epoch` ended without an outcome: back to Open with a fresh
    /// cooldown. No-op if that probe is no longer the one in flight.
    pub(crate) fn abandon_probe(&mut self, epoch: u64, now: Instant) -> bool {
        if self.state == CircuitState::HalfOpen && self.probe_epoch == epoch {
            self.trip(now);
            true
        } else {
            false
        }
    }

    /// Whether [`admit`](Self::admit) would currently let an attempt through,
    /// without taking the probe.
    pub(crate) fn would_admit(&self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.cooldown_elapsed(now),
            CircuitState::HalfOpen => false,
        }
    }

    /// Apply an attempt outcome; returns the previous state when it changed.
    pub(crate) fn record(&mut self, outcome: AttemptOutcome, now: Instant) -> Option<CircuitState> {
        let before = self.state;
        match outcome {
            AttemptOutcome::Success => {
                self.consecutive_failures = 0;
                self.state = CircuitState::Closed;
                self.opened_at = None;
            }
            AttemptOutcome::Failure(_) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                match self.state {
                    CircuitState::Closed => {
                        if self.consecutive_failures >= self.settings.failure_threshold {
                            self.trip(now);
                        }
                    }
                    CircuitState::HalfOpen => self.trip(now),
                    // Late failure from an attempt admitted before the trip:
                    // counted, cooldown not restarted.
                    CircuitState::Open => {}
                }
            }
        }
        (before != self.state).then_some(before)
    }

    pub(crate) fn open_remaining(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.opened_at) {
            (CircuitState::Open, Some(at)) => {
                Some((at + self.settings.cooldown).saturating_duration_since(now))
            }
            _ => None,
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.opened_at {
            Some(at) => now >= at + self.settings.cooldown,
            None => true,
        }
    }
}
