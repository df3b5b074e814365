use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::entry::{Entry, EntryStatus};
use crate::store::{DeletionCause, EvictionListener, Store};

/// Configuration for HashMapStore.
#[derive(Debug, Clone)]
pub struct HashMapStoreConfig {
    /// Remove items until the number of items in the map is at most `max_items`.
    pub max_items: usize,
}

impl Default for HashMapStoreConfig {
    fn default() -> Self {
        HashMapStoreConfig { max_items: 10_000 }
    }
}

/// Thread-safe in-memory cache store using HashMap with RwLock.
///
/// This is a simple store suitable for:
/// - Low to moderate concurrency (<8 threads)
/// - Small to medium cache sizes (<1000 items)
/// - Tests that need exact, immediately consistent sizes
///
/// When a write pushes the map over `max_items`, the entries closest to
/// expiry are evicted until the map is back at 90% of `max_items`. For
/// high-concurrency scenarios, consider using `MokaStore` instead.
pub struct HashMapStore<K, V> {
    state: RwLock<HashMap<K, Entry<V>>>,
    len: AtomicUsize,
    max_items: usize,
    listener: Option<EvictionListener>,
}

impl<K, V> HashMapStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Create a new HashMapStore with the given configuration.
    pub fn new(config: HashMapStoreConfig) -> Self {
        HashMapStore {
            state: RwLock::new(HashMap::new()),
            len: AtomicUsize::new(0),
            max_items: config.max_items,
            listener: None,
        }
    }

    /// Create a store that reports capacity evictions to `listener`.
    pub fn with_listener(config: HashMapStoreConfig, listener: EvictionListener) -> Self {
        HashMapStore {
            listener: Some(listener),
            ..Self::new(config)
        }
    }

    /// Once the map outgrows `max_items`, evict the entries closest to expiry
    /// down to the low watermark in one pass. Writes into the freed headroom
    /// do not sweep.
    fn evict_overflow(&self, state: &mut HashMap<K, Entry<V>>) -> usize {
        if state.len() <= self.max_items {
            return 0;
        }

        let to_remove = state.len() - low_watermark(self.max_items);
        if to_remove >= state.len() {
            let evicted = state.len();
            state.clear();
            return evicted;
        }

        let mut by_expiry: Vec<_> = state
            .iter()
            .map(|(k, v)| (v.stale_until, k.clone()))
            .collect();
        // Partition rather than sort: only the `to_remove` earliest matter.
        by_expiry.select_nth_unstable_by_key(to_remove, |(stale_until, _)| *stale_until);

        for (_, key) in by_expiry.into_iter().take(to_remove) {
            state.remove(&key);
        }
        to_remove
    }
}

/// Size a full map is trimmed down to: 90% of `max_items`.
fn low_watermark(max_items: usize) -> usize {
    max_items - max_items / 10
}

#[async_trait]
impl<K, V> Store<K, V> for HashMapStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &'static str {
        "hashmap"
    }

    async fn get(&self, key: &K) -> Option<Entry<V>> {
        let state = self.state.read().await;
        state.get(key).cloned()
    }

    async fn set(&self, key: K, entry: Entry<V>) {
        let evicted = {
            let mut state = self.state.write().await;
            state.insert(key, entry);
            let evicted = self.evict_overflow(&mut state);
            self.len.store(state.len(), Ordering::Relaxed);
            evicted
        };

        if let Some(listener) = &self.listener {
            for _ in 0..evicted {
                listener(DeletionCause::Capacity);
            }
        }
    }

    async fn remove(&self, keys: &[K]) {
        let mut state = self.state.write().await;

        for key in keys {
            state.remove(key);
        }
        self.len.store(state.len(), Ordering::Relaxed);
    }

    async fn remove_expired(&self, key: &K, now_ms: i64) -> bool {
        let mut state = self.state.write().await;

        let expired = state
            .get(key)
            .is_some_and(|entry| entry.status(now_ms) == EntryStatus::Expired);
        if expired {
            state.remove(key);
            self.len.store(state.len(), Ordering::Relaxed);
        }
        expired
    }

    async fn entries(&self) -> Vec<(K, Entry<V>)> {
        let state = self.state.read().await;
        state.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    async fn clear(&self) -> usize {
        let mut state = self.state.write().await;
        let dropped = state.len();
        state.clear();
        self.len.store(0, Ordering::Relaxed);
        dropped
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn capacity(&self) -> usize {
        self.max_items
    }
}
