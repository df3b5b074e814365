//! Batch lookups.
//!
//! A batch fetch that omits a requested key is authoritative for it: with
//! `Op::WriteValue` every omitted key is cached as `Null`, so keys the origin
//! does not know about stop reaching it.

use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::cache::{Cache, Probe};
use crate::entry::{CacheHit, Entry, Op};
use crate::key::CacheKey;

/// Values and hit kinds of a batch lookup, keyed by requested key.
pub type Many<K, V> = (HashMap<K, V>, HashMap<K, CacheHit>);

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    /// `get` for every key. Duplicate keys collapse.
    pub async fn get_many(&self, keys: &[K]) -> Many<K, V> {
        let mut values = HashMap::new();
        let mut hits = HashMap::new();

        for key in keys {
            if hits.contains_key(key) {
                continue;
            }
            let (value, hit) = self.get(key).await;
            if let Some(value) = value {
                values.insert(key.clone(), value);
            }
            hits.insert(key.clone(), hit);
        }

        (values, hits)
    }

    /// `set` for every pair, broadcast as one invalidation.
    pub async fn set_many(&self, values: HashMap<K, V>) {
        let keys: Vec<K> = values.keys().cloned().collect();
        for (key, value) in values {
            self.write_value(key, value).await;
        }
        self.broadcast(&keys).await;
    }

    /// `set_null` for every key, broadcast as one invalidation.
    pub async fn set_null_many(&self, keys: &[K]) {
        for key in keys {
            self.write_null(key.clone()).await;
        }
        self.broadcast(keys).await;
    }

    /// Stale-while-revalidate over a set of keys.
    ///
    /// Fresh keys are served from cache, stale keys are served and refreshed
    /// together in one background batch, and missing keys are loaded with a
    /// single synchronous call to `load_from_origin`. See the module docs for
    /// how omitted keys are cached.
    ///
    /// If the synchronous load fails, `op` still decides whether the missing
    /// keys are cached as `Null`, and the error is returned for the whole batch.
    pub async fn swr_many<F, Fut, E, O>(
        &self,
        keys: &[K],
        load_from_origin: F,
        op: O,
    ) -> Result<Many<K, V>, E>
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HashMap<K, V>, E>> + Send + 'static,
        E: Display + Send + 'static,
        O: Fn(Option<&E>) -> Op + Send + Sync + 'static,
    {
        let load_from_origin = Arc::new(load_from_origin);
        let op = Arc::new(op);

        let mut values = HashMap::new();
        let mut hits = HashMap::new();
        let mut stale = Vec::new();
        let mut missing = Vec::new();
        let mut seen = HashSet::new();

        for key in keys {
            if !seen.insert(key) {
                continue;
            }
            match self.probe(key).await {
                Probe::Fresh(entry) => collect(&mut values, &mut hits, key, entry),
                Probe::Stale(entry) => {
                    collect(&mut values, &mut hits, key, entry);
                    stale.push(key.clone());
                }
                Probe::Missing => missing.push(key.clone()),
            }
        }

        if !stale.is_empty() {
            self.spawn_batch_revalidation(stale, load_from_origin.clone(), op.clone());
        }

        if missing.is_empty() {
            return Ok((values, hits));
        }

        let result = load_from_origin(missing.clone()).await;
        let decision = op(result.as_ref().err());
        match result {
            Ok(found) => {
                let written = self.apply_batch(&missing, &found, decision).await;
                hits.extend(written);
                values.extend(found.into_iter().filter(|(key, _)| missing.contains(key)));
                Ok((values, hits))
            }
            Err(e) => {
                self.apply_batch(&missing, &HashMap::new(), decision).await;
                Err(e)
            }
        }
    }

    /// Write the outcome of a batch fetch for every requested key.
    async fn apply_batch(
        &self,
        requested: &[K],
        found: &HashMap<K, V>,
        op: Op,
    ) -> HashMap<K, CacheHit> {
        let mut hits = HashMap::with_capacity(requested.len());

        for key in requested {
            let hit = match (op, found.get(key)) {
                (Op::WriteValue, Some(value)) => {
                    self.write_value(key.clone(), value.clone()).await;
                    CacheHit::Hit
                }
                (Op::WriteValue, None) | (Op::WriteNull, _) => {
                    self.write_null(key.clone()).await;
                    CacheHit::Null
                }
                (Op::Noop, _) => CacheHit::Miss,
            };
            hits.insert(key.clone(), hit);
        }

        hits
    }

    /// Refresh every stale key not already in flight with one origin call.
    fn spawn_batch_revalidation<F, Fut, E, O>(
        &self,
        keys: Vec<K>,
        load_from_origin: Arc<F>,
        op: Arc<O>,
    ) where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HashMap<K, V>, E>> + Send + 'static,
        E: Display + Send + 'static,
        O: Fn(Option<&E>) -> Op + Send + Sync + 'static,
    {
        let guard = self.inner.inflight.acquire_available(keys);
        if guard.is_empty() {
            return;
        }

        let cache = self.clone();
        let job = async move {
            let keys = guard.keys().to_vec();
            let result = load_from_origin(keys.clone()).await;
            let decision = op(result.as_ref().err());
            match result {
                Ok(found) => {
                    cache.apply_batch(&keys, &found, decision).await;
                }
                Err(e) => {
                    tracing::warn!(
                        resource = %cache.inner.resource,
                        keys = keys.len(),
                        error = %e,
                        "background batch revalidation failed"
                    );
                    cache.apply_batch(&keys, &HashMap::new(), decision).await;
                }
            }
            cache
                .inner
                .metrics
                .record_revalidation(&cache.inner.resource, keys.len());
            drop(guard);
        };

        if !self.inner.pool.try_submit(job.boxed()) {
            tracing::debug!(resource = %self.inner.resource, "revalidation queue full, dropping batch refresh");
        }
    }
}

fn collect<K: CacheKey, V>(
    values: &mut HashMap<K, V>,
    hits: &mut HashMap<K, CacheHit>,
    key: &K,
    entry: Entry<V>,
) {
    if let Some(value) = entry.value {
        values.insert(key.clone(), value);
    }
    hits.insert(key.clone(), entry.hit);
}
