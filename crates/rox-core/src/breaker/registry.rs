//! Process-local registry of per-target breaker state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::clock::{Clock, SystemClock};
use super::state::{Admission, AttemptOutcome, BreakerSettings, CircuitState, TargetState};

/// Point-in-time view of one target's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Remaining cooldown while Open.
    pub open_remaining: Option<Duration>,
}

/// Breaker state for every target seen by this process.
///
/// Constructed once (usually at startup) and shared by reference or `Arc`
/// with every executor. The map lock is held only to find or insert a
/// target; counters and transitions happen under that target's own lock, so
/// unrelated targets never contend and concurrent outcomes on one target are
/// never lost. Nothing is persisted.
pub struct BreakerRegistry<C: Clock = SystemClock> {
    defaults: BreakerSettings,
    targets: Mutex<HashMap<String, Arc<Mutex<TargetState>>>>,
    clock: C,
}

impl<C: Clock> std::fmt::Debug for BreakerRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("defaults", &self.defaults)
            .field("targets", &self.targets.lock().len())
            .finish()
    }
}

impl BreakerRegistry<SystemClock> {
    pub fn new(defaults: BreakerSettings) -> Self {
        Self::with_clock(defaults, SystemClock)
    }
}

impl Default for BreakerRegistry<SystemClock> {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}

impl<C: Clock> BreakerRegistry<C> {
    pub fn with_clock(defaults: BreakerSettings, clock: C) -> Self {
        Self {
            defaults,
            targets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn defaults(&self) -> BreakerSettings {
        self.defaults
    }

    /// Override threshold/cooldown for one target. Keeps its current state.
    pub fn configure(&self, target: &str, settings: BreakerSettings) {
        self.entry(target).lock().settings = settings;
    }

    /// Whether a new attempt against `target` is permitted right now.
    ///
    /// May move Open to HalfOpen; in that case the caller holds the single
    /// probe and must report its outcome through [`record_outcome`], or the
    /// target stays HalfOpen. Prefer [`try_acquire`], whose permit gives the
    /// probe back if it is dropped unreported.
    ///
    /// [`record_outcome`]: BreakerRegistry::record_outcome
    /// [`try_acquire`]: BreakerRegistry::try_acquire
    pub fn should_attempt(&self, target: &str) -> bool {
        !matches!(self.admit(target), Admission::Rejected)
    }

    /// Admit one attempt against `target`, or `None` if the breaker refuses.
    ///
    /// Report the attempt with [`AttemptPermit::record`]. A permit dropped
    /// without an outcome (e.g. the run's future was dropped mid-attempt)
    /// returns a HalfOpen target to Open with a fresh cooldown.
    pub fn try_acquire<'a>(&'a self, target: &'a str) -> Option<AttemptPermit<'a, C>> {
        let probe = match self.admit(target) {
            Admission::Allowed => None,
            Admission::Probe(epoch) => Some(epoch),
            Admission::Rejected => return None,
        };
        Some(AttemptPermit {
            registry: self,
            target,
            probe,
        })
    }

    fn admit(&self, target: &str) -> Admission {
        let entry = self.entry(target);
        let mut state = entry.lock();
        let admission = state.admit(self.clock.now());
        if let Admission::Probe(epoch) = admission {
            tracing::info!(key = %target, epoch, "breaker half-open, admitting probe");
        }
        admission
    }

    fn abandon_probe(&self, target: &str, epoch: u64) {
        let entry = self.entry(target);
        let mut state = entry.lock();
        if state.abandon_probe(epoch, self.clock.now()) {
            tracing::info!(key = %target, epoch, "probe abandoned without outcome, breaker reopened");
        }
    }

    /// Whether an attempt would be refused right now. Unlike
    /// [`should_attempt`](BreakerRegistry::should_attempt) this never changes
    /// state, so it can be asked before committing to a backoff sleep.
    pub fn would_refuse(&self, target: &str) -> bool {
        let entry = self.targets.lock().get(target).cloned();
        match entry {
            Some(entry) => !entry.lock().would_admit(self.clock.now()),
            None => false,
        }
    }

    /// Record the outcome of one attempt against `target`.
    pub fn record_outcome(&self, target: &str, outcome: AttemptOutcome) {
        let entry = self.entry(target);
        let mut state = entry.lock();
        if let Some(before) = state.record(outcome, self.clock.now()) {
            tracing::info!(
                key = %target,
                from = %before,
                to = %state.state,
                consecutive_failures = state.consecutive_failures,
                "breaker transition"
            );
        }
    }

    /// Current view of `target`, or `None` if it has never been used.
    pub fn snapshot(&self, target: &str) -> Option<BreakerSnapshot> {
        let entry = self.targets.lock().get(target).cloned()?;
        let state = entry.lock();
        Some(BreakerSnapshot {
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            open_remaining: state.open_remaining(self.clock.now()),
        })
    }

    /// Keys of every target seen so far, sorted.
    pub fn targets(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.targets.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Force `target` back to Closed with a zero failure count.
    pub fn reset(&self, target: &str) {
        let entry = self.targets.lock().get(target).cloned();
        if let Some(entry) = entry {
            let mut state = entry.lock();
            let settings = state.settings;
            *state = TargetState::new(settings);
            tracing::info!(key = %target, "breaker reset");
        }
    }

    fn entry(&self, target: &str) -> Arc<Mutex<TargetState>> {
        let mut targets = self.targets.lock();
        if let Some(entry) = targets.get(target) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(Mutex::new(TargetState::new(self.defaults)));
        targets.insert(target.to_string(), Arc::clone(&entry));
        entry
    }
}

/// Admission for one attempt, from [`BreakerRegistry::try_acquire`].
#[must_use = "an unreported probe permit reopens the breaker when dropped"]
pub struct AttemptPermit<'a, C: Clock = SystemClock> {
    registry: &'a BreakerRegistry<C>,
    target: &'a str,
    /// Epoch of the HalfOpen probe this permit holds, if any.
    probe: Option<u64>,
}

impl<C: Clock> AttemptPermit<'_, C> {
    /// Whether this attempt is the single HalfOpen probe.
    pub fn is_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// Report the attempt's outcome and release the permit.
    pub fn record(mut self, outcome: AttemptOutcome) {
        self.probe = None;
        self.registry.record_outcome(self.target, outcome);
    }
}

impl<C: Clock> Drop for AttemptPermit<'_, C> {
    fn drop(&mut self) {
        if let Some(epoch) = self.probe.take() {
            self.registry.abandon_probe(self.target, epoch);
        }
    }
}

impl<C: Clock> std::fmt::Debug for AttemptPermit<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptPermit")
            .field("target", &self.target)
            .field("probe", &self.probe)
            .finish()
    }
}
