//! Retry loop: attempt, classify, suspend, until success or policy says stop.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::breaker::{AttemptOutcome, BreakerRegistry, Clock};
use crate::retry::{self, Describe, FailureClass, RetryPolicy};

use super::error::ExecutorError;

/// Where the loop is. Every cancellation and suspension point is a state
/// boundary, so they can be read straight off the `match` below.
enum Step<T, E> {
    Attempting { attempt: u32 },
    Suspended { attempt: u32, delay: Duration },
    Done(Result<T, ExecutorError<E>>),
}

pub(super) async fn run_loop<C, T, E, F, Fut>(
    breakers: &BreakerRegistry<C>,
    target: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, ExecutorError<E>>
where
    C: Clock,
    E: Describe,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last: Option<(FailureClass, E)> = None;
    let mut step = Step::Attempting { attempt: 1 };
    loop {
        step = match step {
            Step::Done(result) => return result,

            Step::Attempting { attempt } => {
                if cancel.is_cancelled() {
                    tracing::debug!(key = %target, attempt, "run canceled before attempt");
                    Step::Done(Err(ExecutorError::Canceled { attempts: attempt - 1 }))
                } else if let Some(permit) = breakers.try_acquire(target) {
                    // `permit` lives across the attempt; dropping this future
                    // mid-probe hands the probe back through its Drop.
                    match op().await {
                        Ok(value) => {
                            permit.record(AttemptOutcome::Success);
                            if attempt > 1 {
                                tracing::debug!(key = %target, attempt, "succeeded after retry");
                            }
                            Step::Done(Ok(value))
                        }
                        Err(err) => {
                            let failure = err.describe();
                            let class = retry::classify(&failure, policy);
                            permit.record(AttemptOutcome::Failure(class));
                            if class == FailureClass::Unknown {
                                tracing::warn!(key = %target, attempt, code = %failure, class = %class, "unclassified failure");
                            } else {
                                tracing::debug!(key = %target, attempt, code = %failure, class = %class, "attempt failed");
                            }

                            if !class.allows_retry() || attempt >= policy.max_attempts() {
                                Step::Done(Err(ExecutorError::Failed {
                                    class,
                                    attempts: attempt,
                                    last_error: err,
                                }))
                            } else if breakers.would_refuse(target) {
                                // our own failures tripped the breaker; don't sleep for nothing
                                Step::Done(Err(refused(target, attempt + 1, Some((class, err)))))
                            } else {
                                last = Some((class, err));
                                Step::Suspended {
                                    attempt,
                                    delay: retry::delay_for(attempt, policy),
                                }
                            }
                        }
                    }
                } else {
                    Step::Done(Err(refused(target, attempt, last.take())))
                }
            }

            Step::Suspended { attempt, delay } => {
                tracing::debug!(key = %target, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(key = %target, attempt, "run canceled during backoff");
                        Step::Done(Err(ExecutorError::Canceled { attempts: attempt }))
                    }
                    _ = tokio::time::sleep(delay) => Step::Attempting { attempt: attempt + 1 },
                }
            }
        };
    }
}

/// Breaker refused an attempt. Up front that is `CircuitOpen`; mid-run the
/// breaker was tripped by our own failures, so report the last one.
fn refused<E>(target: &str, attempt: u32, last: Option<(FailureClass, E)>) -> ExecutorError<E> {
    match last {
        None => {
            tracing::debug!(key = %target, "circuit open, not attempting");
            ExecutorError::CircuitOpen {
                target: target.to_string(),
            }
        }
        Some((class, last_error)) => {
            tracing::debug!(key = %target, attempt, "circuit opened mid-run, giving up");
            ExecutorError::Failed {
                class,
                attempts: attempt - 1,
                last_error,
            }
        }
    }
}
