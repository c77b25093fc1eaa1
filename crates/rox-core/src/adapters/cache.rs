//! In-memory collection index cache refreshed through the executor.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::breaker::{Clock, TargetKey};
use crate::executor::{Executor, ExecutorError};
use crate::retry::{Describe, FailureDescriptor, RetryPolicy, STALE_SOURCE};

/// One loaded generation of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot<T> {
    /// Monotonic source generation (e.g. a server-side revision).
    pub generation: u64,
    pub entries: T,
}

/// Failure of one refresh attempt.
#[derive(Debug, Error)]
pub enum RefreshError<E> {
    /// Source answered with an older generation than we already hold,
    /// typically a lagging mirror. Retried under the cache policy.
    #[error("source generation {offered} is older than cached {cached}")]
    Stale { cached: u64, offered: u64 },

    #[error("index source failed")]
    Source(#[source] E),
}

impl<E: Describe> Describe for RefreshError<E> {
    fn describe(&self) -> FailureDescriptor {
        match self {
            RefreshError::Stale { .. } => FailureDescriptor::app(STALE_SOURCE),
            RefreshError::Source(e) => e.describe(),
        }
    }
}

/// Named index cache. The breaker target is `cache:<name>`.
#[derive(Debug)]
pub struct IndexCache<T> {
    name: String,
    current: RwLock<Option<Arc<IndexSnapshot<T>>>>,
}

impl<T> IndexCache<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> String {
        TargetKey::for_cache(&self.name)
    }

    pub fn current(&self) -> Option<Arc<IndexSnapshot<T>>> {
        self.current.read().clone()
    }

    pub fn generation(&self) -> Option<u64> {
        self.current.read().as_ref().map(|s| s.generation)
    }

    /// Load a fresh snapshot via `load`, retried under `policy`.
    ///
    /// On failure the cached snapshot is left untouched, so callers can keep
    /// serving it. A concurrent refresh that already stored a newer
    /// generation is never overwritten.
    pub async fn refresh<C, E, F, Fut>(
        &self,
        executor: &Executor<C>,
        policy: &RetryPolicy,
        mut load: F,
    ) -> Result<Arc<IndexSnapshot<T>>, ExecutorError<RefreshError<E>>>
    where
        C: Clock,
        E: Describe,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<IndexSnapshot<T>, E>>,
    {
        let target = self.target();
        let fresh = executor
            .run(&target, policy, || {
                let cached = self.generation();
                let pending = load();
                async move {
                    let snapshot = pending.await.map_err(RefreshError::Source)?;
                    match cached {
                        Some(cached) if snapshot.generation < cached => Err(RefreshError::Stale {
                            cached,
                            offered: snapshot.generation,
                        }),
                        _ => Ok(snapshot),
                    }
                }
            })
            .await?;

        let mut current = self.current.write();
        match current.as_ref() {
            Some(held) if held.generation > fresh.generation => Ok(Arc::clone(held)),
            _ => {
                let fresh = Arc::new(fresh);
                *current = Some(Arc::clone(&fresh));
                tracing::debug!(cache = %self.name, generation = fresh.generation, "index refreshed");
                Ok(fresh)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerRegistry;
    use crate::retry::{FailureClass, SystemCode};
    use std::cell::Cell;

    fn executor() -> Executor {
        Executor::new(Arc::new(BreakerRegistry::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn first_refresh_populates() {
        let cache: IndexCache<Vec<&str>> = IndexCache::new("collections");
        let snap = cache
            .refresh(&executor(), &RetryPolicy::cache_refresh(), || async {
                Ok::<_, FailureDescriptor>(IndexSnapshot { generation: 3, entries: vec!["a", "b"] })
            })
            .await
            .unwrap();
        assert_eq!(snap.generation, 3);
        assert_eq!(cache.generation(), Some(3));
        assert_eq!(cache.target(), "cache:collections");
    }

    #[tokio::test(start_paused = true)]
    async fn stale_source_retried_until_fresh() {
        let cache: IndexCache<u32> = IndexCache::new("idx");
        let ex = executor();
        let policy = RetryPolicy::cache_refresh();
        cache
            .refresh(&ex, &policy, || async {
                Ok::<_, FailureDescriptor>(IndexSnapshot { generation: 5, entries: 0 })
            })
            .await
            .unwrap();

        let calls = Cell::new(0u64);
        let snap = cache
            .refresh(&ex, &policy, || {
                calls.set(calls.get() + 1);
                // lagging mirror answers 4 first, then catches up
                let generation = if calls.get() == 1 { 4 } else { 6 };
                async move { Ok::<_, FailureDescriptor>(IndexSnapshot { generation, entries: 1 }) }
            })
            .await
            .unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(snap.generation, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_old_snapshot() {
        let cache: IndexCache<u32> = IndexCache::new("idx");
        let ex = executor();
        let policy = RetryPolicy::cache_refresh();
        cache
            .refresh(&ex, &policy, || async {
                Ok::<_, FailureDescriptor>(IndexSnapshot { generation: 1, entries: 10 })
            })
            .await
            .unwrap();

        let err = cache
            .refresh(&ex, &policy, || async {
                Err::<IndexSnapshot<u32>, _>(FailureDescriptor::System(SystemCode::PermissionDenied))
            })
            .await
            .unwrap_err();
        assert_eq!(err.class(), Some(FailureClass::NonRetryable));
        assert_eq!(cache.current().unwrap().entries, 10);
    }
}
