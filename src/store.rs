use async_trait::async_trait;
use std::sync::Arc;

use crate::entry::Entry;

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionCause {
    /// Removed by `remove`, `clear` or an invalidation.
    Explicit,
    /// Read after `stale_until`, or idle-expired by the store.
    Expired,
    /// Evicted to stay within capacity.
    Capacity,
}

impl DeletionCause {
    /// Label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionCause::Explicit => "explicit",
            DeletionCause::Expired => "expired",
            DeletionCause::Capacity => "capacity",
        }
    }
}

/// Callback a store invokes whenever it drops entries on its own.
pub type EvictionListener = Arc<dyn Fn(DeletionCause) + Send + Sync>;

/// A store is a bounded key-value map holding cache entries for one cache.
///
/// Stores only hold entries; all freshness decisions are made by the cache
/// with its own clock. A store that evicts entries by itself (capacity, idle
/// time) reports it through an [`EvictionListener`] handed to its constructor.
#[async_trait]
pub trait Store<K, V>: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "hashmap"
    /// - "moka"
    fn name(&self) -> &'static str;

    /// Return the stored entry, `None` if the key is absent.
    async fn get(&self, key: &K) -> Option<Entry<V>>;

    /// Insert or overwrite the entry for the key.
    async fn set(&self, key: K, entry: Entry<V>);

    /// Removes the key(s) from the store.
    async fn remove(&self, keys: &[K]);

    /// Remove the entry for `key` only if it is still expired at `now_ms`.
    ///
    /// The check and the removal are atomic, so an entry rewritten between a
    /// read and this call survives. Returns whether an entry was removed.
    async fn remove_expired(&self, key: &K, now_ms: i64) -> bool;

    /// Snapshot of every entry currently held.
    async fn entries(&self) -> Vec<(K, Entry<V>)>;

    /// Remove everything and return how many entries were dropped.
    async fn clear(&self) -> usize;

    /// Number of entries currently held. May lag behind for concurrent stores.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries before the store starts evicting.
    fn capacity(&self) -> usize;
}
