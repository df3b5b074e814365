use std::fmt;
use std::slice;
use std::sync::Arc;

use crate::builder::CacheBuilder;
use crate::clock::Clock;
use crate::cluster::{Broadcaster, InvalidationEvent};
use crate::config::CacheConfig;
use crate::entry::{CacheHit, Entry, EntryStatus, Op};
use crate::key::CacheKey;
use crate::metrics::Metrics;
use crate::revalidate::{InflightSet, RefreshPool};
use crate::store::{DeletionCause, Store};

/// Where a cache publishes its own writes so peers drop their copies.
pub(crate) struct ClusterLink {
    pub(crate) broadcaster: Arc<dyn Broadcaster>,
    pub(crate) node_id: String,
}

pub(crate) struct CacheInner<K: CacheKey, V> {
    pub(crate) resource: String,
    pub(crate) fresh_ms: i64,
    pub(crate) stale_ms: i64,
    pub(crate) store: Arc<dyn Store<K, V>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Arc<dyn Metrics>,
    /// To prevent concurrent revalidation of the same data, all revalidations are deduplicated.
    pub(crate) inflight: Arc<InflightSet<K>>,
    pub(crate) pool: RefreshPool,
    pub(crate) cluster: Option<ClusterLink>,
}

/// State of a key as seen by a read.
pub(crate) enum Probe<V> {
    Fresh(Entry<V>),
    Stale(Entry<V>),
    Missing,
}

/// A typed stale-while-revalidate cache for one logical resource.
///
/// Handles are cheap to clone and share the same store, worker pool and
/// inflight set.
///
/// # Example
/// ```ignore
/// let cache: Cache<String, ApiKey> = Cache::builder(CacheConfig::new(
///     "api_keys",
///     Duration::from_secs(60),
///     Duration::from_secs(300),
///     10_000,
/// ))
/// .clock(Arc::new(SystemClock))
/// .registry(registry.clone())
/// .build()?;
///
/// let (key, hit) = cache
///     .swr(hash, |hash| async move { db.find_key(&hash).await }, |err| match err {
///         None => Op::WriteValue,
///         Some(DbError::NotFound) => Op::WriteNull,
///         Some(_) => Op::Noop,
///     })
///     .await?;
/// ```
pub struct Cache<K: CacheKey, V> {
    pub(crate) inner: Arc<CacheInner<K, V>>,
}

impl<K: CacheKey, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Cache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: CacheKey, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("resource", &self.inner.resource)
            .field("store", &self.inner.store.name())
            .field("fresh_ms", &self.inner.fresh_ms)
            .field("stale_ms", &self.inner.stale_ms)
            .finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    /// Start configuring a cache.
    pub fn builder(config: CacheConfig) -> CacheBuilder<K, V> {
        CacheBuilder::new(config)
    }

    /// The resource name this cache was configured with.
    pub fn name(&self) -> &str {
        &self.inner.resource
    }

    /// Entries currently held by the store.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.store.capacity()
    }

    /// Return the cached value without ever touching the origin.
    ///
    /// Stale entries are still returned. Expired entries are deleted and
    /// reported as `Miss`.
    pub async fn get(&self, key: &K) -> (Option<V>, CacheHit) {
        match self.probe(key).await {
            Probe::Fresh(entry) | Probe::Stale(entry) => (entry.value, entry.hit),
            Probe::Missing => (None, CacheHit::Miss),
        }
    }

    /// Set the value in the cache.
    pub async fn set(&self, key: K, value: V) {
        self.write_value(key.clone(), value).await;
        self.broadcast(slice::from_ref(&key)).await;
    }

    /// Cache that the key does not exist upstream.
    pub async fn set_null(&self, key: K) {
        self.write_null(key.clone()).await;
        self.broadcast(slice::from_ref(&key)).await;
    }

    /// Removes the keys from the cache.
    pub async fn remove(&self, keys: &[K]) {
        self.remove_local(keys).await;
        self.broadcast(keys).await;
    }

    /// Drop every entry. Peers are not notified.
    pub async fn clear(&self) {
        let dropped = self.inner.store.clear().await;
        for _ in 0..dropped {
            self.inner
                .metrics
                .record_deleted(&self.inner.resource, DeletionCause::Explicit.as_str());
        }
        tracing::debug!(resource = %self.inner.resource, dropped, "cache cleared");
        self.report_size();
    }

    /// Remove keys without notifying peers.
    pub(crate) async fn remove_local(&self, keys: &[K]) {
        if keys.is_empty() {
            return;
        }
        self.inner.store.remove(keys).await;
        for _ in keys {
            self.inner
                .metrics
                .record_deleted(&self.inner.resource, DeletionCause::Explicit.as_str());
        }
        self.report_size();
    }

    /// Read and classify the entry for `key`, deleting it if it has expired.
    ///
    /// The deletion re-checks expiry inside the store, so a write that lands
    /// between the read and the delete is kept.
    pub(crate) async fn probe(&self, key: &K) -> Probe<V> {
        let inner = &self.inner;
        let now = inner.clock.now_ms();
        let probe = match inner.store.get(key).await {
            None => Probe::Missing,
            Some(entry) => match entry.status(now) {
                EntryStatus::Fresh => Probe::Fresh(entry),
                EntryStatus::Stale => Probe::Stale(entry),
                EntryStatus::Expired => {
                    if inner.store.remove_expired(key, now).await {
                        inner
                            .metrics
                            .record_deleted(&inner.resource, DeletionCause::Expired.as_str());
                    }
                    Probe::Missing
                }
            },
        };

        inner
            .metrics
            .record_read(&inner.resource, !matches!(probe, Probe::Missing));
        probe
    }

    pub(crate) async fn write_value(&self, key: K, value: V) {
        let (fresh_until, stale_until) = self.deadlines();
        self.inner
            .store
            .set(key, Entry::new(value, fresh_until, stale_until))
            .await;
        self.report_size();
    }

    pub(crate) async fn write_null(&self, key: K) {
        let (fresh_until, stale_until) = self.deadlines();
        self.inner
            .store
            .set(key, Entry::null(fresh_until, stale_until))
            .await;
        self.report_size();
    }

    /// Apply an `Op` to the outcome of an origin fetch and return the
    /// resulting hit kind. `value` is `None` when the fetch failed.
    pub(crate) async fn apply(&self, key: K, op: Op, value: Option<&V>) -> CacheHit {
        match (op, value) {
            (Op::WriteValue, Some(value)) => {
                self.write_value(key, value.clone()).await;
                CacheHit::Hit
            }
            (Op::WriteValue, None) => {
                // Nothing to write: the origin returned an error.
                tracing::debug!(
                    resource = %self.inner.resource,
                    key = ?key,
                    "WriteValue requested for a failed fetch, skipping"
                );
                CacheHit::Miss
            }
            (Op::WriteNull, _) => {
                self.write_null(key).await;
                CacheHit::Null
            }
            (Op::Noop, _) => CacheHit::Miss,
        }
    }

    /// Tell peers to drop their copies of `keys`.
    pub(crate) async fn broadcast(&self, keys: &[K]) {
        let Some(cluster) = &self.inner.cluster else {
            return;
        };
        if keys.is_empty() {
            return;
        }

        let event = InvalidationEvent {
            cache_name: self.inner.resource.clone(),
            keys: keys.iter().map(CacheKey::to_key_string).collect(),
            origin_node: cluster.node_id.clone(),
        };
        if let Err(e) = cluster.broadcaster.broadcast(event).await {
            tracing::warn!(
                resource = %self.inner.resource,
                keys = keys.len(),
                error = %e,
                "failed to broadcast invalidation"
            );
        }
    }

    fn deadlines(&self) -> (i64, i64) {
        let now = self.inner.clock.now_ms();
        (
            now.saturating_add(self.inner.fresh_ms),
            now.saturating_add(self.inner.stale_ms),
        )
    }

    fn report_size(&self) {
        let store = &self.inner.store;
        self.inner
            .metrics
            .record_size_and_capacity(&self.inner.resource, store.len(), store.capacity());
    }
}
