//! Resilient operation executor.
//!
//! Wraps any fallible async operation with the call site's [`RetryPolicy`]
//! and the shared [`BreakerRegistry`]: refuses work against open targets,
//! stops at the first non-retryable failure, and otherwise retries with a
//! bounded linear backoff. Suspensions are `tokio` sleeps, so concurrent runs
//! on other targets are never blocked.

mod error;
mod run;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::breaker::{BreakerRegistry, Clock, SystemClock};
use crate::retry::{Describe, RetryPolicy};

pub use error::ExecutorError;

/// Entry point for every resilient call. Cheap to clone; clones share the registry.
pub struct Executor<C: Clock = SystemClock> {
    breakers: Arc<BreakerRegistry<C>>,
}

impl<C: Clock> Clone for Executor<C> {
    fn clone(&self) -> Self {
        Self {
            breakers: Arc::clone(&self.breakers),
        }
    }
}

impl<C: Clock> std::fmt::Debug for Executor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("breakers", &self.breakers).finish()
    }
}

impl<C: Clock> Executor<C> {
    pub fn new(breakers: Arc<BreakerRegistry<C>>) -> Self {
        Self { breakers }
    }

    pub fn breakers(&self) -> &BreakerRegistry<C> {
        &self.breakers
    }

    /// Run `op` against `target` under `policy`.
    ///
    /// Invokes `op` between 1 and `policy.max_attempts()` times, or not at
    /// all when the breaker is open. Total sleep is at most
    /// `(max_attempts - 1) * max_delay_ms`.
    pub async fn run<T, E, F, Fut>(
        &self,
        target: &str,
        policy: &RetryPolicy,
        op: F,
    ) -> Result<T, ExecutorError<E>>
    where
        E: Describe,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        run::run_loop(&self.breakers, target, policy, &CancellationToken::new(), op).await
    }

    /// Like [`run`](Executor::run), returning `Canceled` promptly once `cancel` fires.
    ///
    /// The token is checked before every attempt and raced against every
    /// backoff sleep. An attempt already in progress is allowed to finish.
    pub async fn run_cancellable<T, E, F, Fut>(
        &self,
        target: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, ExecutorError<E>>
    where
        E: Describe,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        run::run_loop(&self.breakers, target, policy, cancel, op).await
    }
}
