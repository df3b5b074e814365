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
    /// Stale-while-revalidate over alternative keys for the same value.
    ///
    /// `candidates` are checked in order and the first usable entry wins: a
    /// fresh one is returned as is, a stale one is returned and refreshed in
    /// the background. When none is cached, `load_from_origin` is called once.
    ///
    /// The origin reports which key the value really belongs to, and every
    /// write lands under that canonical key. Looking a domain up by hostname
    /// and by its id, for example, fills the id slot either way.
    pub async fn swr_with_fallback<F, Fut, E, O>(
        &self,
        candidates: &[K],
        load_from_origin: F,
        op: O,
    ) -> Result<(Option<V>, CacheHit), E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = (K, Result<V, E>)> + Send + 'static,
        E: Display + Send + 'static,
        O: Fn(Option<&E>) -> Op + Send + Sync + 'static,
    {
        for candidate in candidates {
            match self.probe(candidate).await {
                Probe::Fresh(entry) => return Ok((entry.value, entry.hit)),
                Probe::Stale(entry) => {
                    self.spawn_fallback_revalidation(candidate.clone(), load_from_origin, op);
                    return Ok((entry.value, entry.hit));
                }
                Probe::Missing => {}
            }
        }

        let (canonical, result) = load_from_origin().await;
        let decision = op(result.as_ref().err());
        match result {
            Ok(value) => {
                let hit = self.apply(canonical, decision, Some(&value)).await;
                Ok((Some(value), hit))
            }
            Err(e) => {
                self.apply(canonical, decision, None).await;
                Err(e)
            }
        }
    }

    /// Refresh on behalf of the stale `candidate`; the result is written under
    /// whatever key the origin names.
    fn spawn_fallback_revalidation<F, Fut, E, O>(&self, candidate: K, load_from_origin: F, op: O)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = (K, Result<V, E>)> + Send + 'static,
        E: Display + Send + 'static,
        O: Fn(Option<&E>) -> Op + Send + Sync + 'static,
    {
        let Some(guard) = self.inner.inflight.try_acquire(candidate) else {
            return;
        };

        let cache = self.clone();
        let job = async move {
            let _guard = guard;
            let (canonical, result) = load_from_origin().await;
            let decision = op(result.as_ref().err());
            match result {
                Ok(value) => {
                    cache.apply(canonical, decision, Some(&value)).await;
                }
                Err(e) => {
                    tracing::warn!(
                        resource = %cache.inner.resource,
                        key = ?canonical,
                        error = %e,
                        "background fallback revalidation failed"
                    );
                    cache.apply(canonical, decision, None).await;
                }
            }
            cache
                .inner
                .metrics
                .record_revalidation(&cache.inner.resource, 1);
        };

        if !self.inner.pool.try_submit(job.boxed()) {
            tracing::debug!(resource = %self.inner.resource, "revalidation queue full, dropping fallback refresh");
        }
    }
}
