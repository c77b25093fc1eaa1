//! Linear, hard-capped backoff schedule with symmetric jitter.

use std::time::Duration;

use rand::Rng;

use super::policy::RetryPolicy;

/// Delay before the attempt following `attempt` (1-based), using the thread RNG for jitter.
pub fn delay_for(attempt: u32, policy: &RetryPolicy) -> Duration {
    delay_for_with(attempt, policy, &mut rand::thread_rng())
}

/// Same as [`delay_for`] with an explicit jitter source.
///
/// `raw = base + (attempt - 1) * step`, capped at `max_delay_ms`, then
/// perturbed by up to `±jitter_ms` and clamped back into `[0, max_delay_ms]`.
pub fn delay_for_with<R: Rng + ?Sized>(attempt: u32, policy: &RetryPolicy, rng: &mut R) -> Duration {
    let capped = capped_delay_ms(attempt, policy);
    let max = policy.max_delay_ms();
    let jitter = policy.jitter_ms();
    let jittered = if jitter == 0 {
        capped
    } else {
        let offset = rng.gen_range(0..=jitter.saturating_mul(2));
        // offset in [0, 2j] stands for [-j, +j]
        capped.saturating_add(offset).saturating_sub(jitter)
    };
    Duration::from_millis(jittered.min(max))
}

/// Deterministic part of the schedule, before jitter.
pub fn capped_delay_ms(attempt: u32, policy: &RetryPolicy) -> u64 {
    let steps = u64::from(attempt.max(1) - 1);
    let raw = policy
        .base_delay_ms()
        .saturating_add(steps.saturating_mul(policy.step_ms()));
    raw.min(policy.max_delay_ms())
}
