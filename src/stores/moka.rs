use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::ops::compute;
use std::hash::Hash;
use std::time::Duration;

use crate::entry::{Entry, EntryStatus};
use crate::store::{DeletionCause, EvictionListener, Store};

/// Configuration for MokaStore.
#[derive(Debug, Clone)]
pub struct MokaStoreConfig {
    /// Maximum number of entries the cache can hold.
    pub max_capacity: u64,

    /// Time to idle: entries are dropped if not accessed within this duration.
    /// `None` means entries don't expire based on idle time.
    ///
    /// Freshness is always decided by the cache's clock; this only bounds how
    /// long untouched entries occupy memory.
    pub time_to_idle: Option<Duration>,
}

impl Default for MokaStoreConfig {
    fn default() -> Self {
        MokaStoreConfig {
            max_capacity: 10_000,
            time_to_idle: None,
        }
    }
}

/// High-performance concurrent cache store using Moka.
///
/// MokaStore provides:
/// - Lock-free concurrent access for reads and writes
/// - Automatic background eviction with configurable policies
/// - Excellent performance under high concurrency (>8 threads)
/// - Suitable for large cache sizes (>10,000 items)
///
/// This is the store a `CacheBuilder` uses unless told otherwise.
pub struct MokaStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<K, Entry<V>>,
    max_capacity: u64,
}

impl<K, V> MokaStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new MokaStore with the given configuration.
    ///
    /// # Example
    /// ```ignore
    /// let config = MokaStoreConfig {
    ///     max_capacity: 10_000,
    ///     time_to_idle: Some(Duration::from_secs(600)),
    /// };
    /// let store = MokaStore::new(config);
    /// ```
    pub fn new(config: MokaStoreConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a store that reports capacity and idle evictions to `listener`.
    pub fn with_listener(config: MokaStoreConfig, listener: EvictionListener) -> Self {
        Self::build(config, Some(listener))
    }

    fn build(config: MokaStoreConfig, listener: Option<EvictionListener>) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        if let Some(listener) = listener {
            // Explicit and replaced removals are reported by the cache itself.
            builder = builder.eviction_listener(move |_key, _value, cause| match cause {
                RemovalCause::Size => listener(DeletionCause::Capacity),
                RemovalCause::Expired => listener(DeletionCause::Expired),
                _ => {}
            });
        }

        MokaStore {
            cache: builder.build(),
            max_capacity: config.max_capacity,
        }
    }

    /// Apply pending evictions so `len` is exact. Mostly useful in tests.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl<K, V> Store<K, V> for MokaStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "moka"
    }

    async fn get(&self, key: &K) -> Option<Entry<V>> {
        self.cache.get(key).await
    }

    async fn set(&self, key: K, entry: Entry<V>) {
        // Moka handles eviction automatically based on capacity
        self.cache.insert(key, entry).await;
    }

    async fn remove(&self, keys: &[K]) {
        for key in keys {
            self.cache.invalidate(key).await;
        }
    }

    async fn remove_expired(&self, key: &K, now_ms: i64) -> bool {
        let result = self
            .cache
            .entry(key.clone())
            .and_compute_with(|current| {
                let expired = current
                    .is_some_and(|entry| entry.value().status(now_ms) == EntryStatus::Expired);
                std::future::ready(if expired {
                    compute::Op::Remove
                } else {
                    compute::Op::Nop
                })
            })
            .await;
        matches!(result, compute::CompResult::Removed(_))
    }

    async fn entries(&self) -> Vec<(K, Entry<V>)> {
        self.cache
            .iter()
            .map(|(key, entry)| (K::clone(&key), entry))
            .collect()
    }

    async fn clear(&self) -> usize {
        // Flush pending writes first so the count includes them.
        self.cache.run_pending_tasks().await;
        let dropped = self.len();
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        dropped
    }

    fn len(&self) -> usize {
        usize::try_from(self.cache.entry_count()).unwrap_or(usize::MAX)
    }

    fn capacity(&self) -> usize {
        usize::try_from(self.max_capacity).unwrap_or(usize::MAX)
    }
}
