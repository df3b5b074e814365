use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;

use crate::cache::{Cache, Probe};
use crate::entry::{CacheHit, Op};
use crate::key::CacheKey;

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    /// Stale-while-revalidate: Get the cached value or load from origin.
    ///
    /// This method implements the SWR pattern:
    /// - If the value is fresh, return it immediately
    /// - If the value is stale, return it and revalidate in the background
    /// - If the value is missing or expired, load from origin
    ///
    /// After every origin call `op` decides what gets cached. On the
    /// synchronous path an origin error is returned as `Err` once `op` has been
    /// applied, so a `WriteNull` for a not-found error still caches the null.
    /// Errors from background refreshes are logged and never returned.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `load_from_origin` - Function to load the value if not cached or stale (receives the key)
    /// * `op` - Maps the fetch error, `None` on success, to the cache write
    pub async fn swr<F, Fut, E, O>(
        &self,
        key: K,
        load_from_origin: F,
        op: O,
    ) -> Result<(Option<V>, CacheHit), E>
    where
        F: FnOnce(K) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
        O: Fn(Option<&E>) -> Op + Send + Sync + 'static,
    {
        match self.probe(&key).await {
            Probe::Fresh(entry) => Ok((entry.value, entry.hit)),
            Probe::Stale(entry) => {
                // Return stale value, revalidate in background
                self.spawn_revalidation(key, load_from_origin, op);
                Ok((entry.value, entry.hit))
            }
            Probe::Missing => {
                let result = load_from_origin(key.clone()).await;
                let decision = op(result.as_ref().err());
                match result {
                    Ok(value) => {
                        let hit = self.apply(key, decision, Some(&value)).await;
                        Ok((Some(value), hit))
                    }
                    Err(e) => {
                        self.apply(key, decision, None).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Queue a background refresh of `key` unless one is already in flight.
    fn spawn_revalidation<F, Fut, E, O>(&self, key: K, load_from_origin: F, op: O)
    where
        F: FnOnce(K) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
        O: Fn(Option<&E>) -> Op + Send + Sync + 'static,
    {
        let Some(guard) = self.inner.inflight.try_acquire(key.clone()) else {
            tracing::trace!(resource = %self.inner.resource, key = ?key, "revalidation already in flight");
            return;
        };

        let cache = self.clone();
        let job = async move {
            let _guard = guard;
            let result = load_from_origin(key.clone()).await;
            let decision = op(result.as_ref().err());
            match result {
                Ok(value) => {
                    cache.apply(key, decision, Some(&value)).await;
                }
                Err(e) => {
                    tracing::warn!(
                        resource = %cache.inner.resource,
                        key = ?key,
                        error = %e,
                        "background revalidation failed"
                    );
                    cache.apply(key, decision, None).await;
                }
            }
            cache
                .inner
                .metrics
                .record_revalidation(&cache.inner.resource, 1);
        };

        if !self.inner.pool.try_submit(job.boxed()) {
            tracing::debug!(resource = %self.inner.resource, "revalidation queue full, dropping refresh");
        }
    }
}
