//! Export and import of live cache contents, e.g. to warm a new process.
//!
//! Snapshots are versioned JSON:
//!
//! ```json
//! {"version":1,"resource":"users","entries":[
//!   {"key":"1","value":"Alice","fresh_until":1700000060000,"stale_until":1700000300000,"hit":"hit"}
//! ]}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::entry::{CacheHit, EntryStatus};
use crate::error::CacheError;
use crate::key::CacheKey;

/// Format version written by [`Cache::dump`].
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a, V> {
    version: u32,
    resource: &'a str,
    entries: Vec<SnapshotEntry<V>>,
}

/// Read first so an unknown version is reported before the entries are
/// decoded with the current value type.
#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
    resource: String,
}

#[derive(Deserialize)]
struct SnapshotIn<V> {
    entries: Vec<SnapshotEntry<V>>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry<V> {
    key: String,
    value: Option<V>,
    fresh_until: i64,
    stale_until: i64,
    hit: CacheHit,
}

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Serialize every entry that has not expired.
    pub async fn dump(&self) -> Result<Vec<u8>, CacheError> {
        let now = self.inner.clock.now_ms();
        let entries: Vec<SnapshotEntry<V>> = self
            .inner
            .store
            .entries()
            .await
            .into_iter()
            .filter(|(_, entry)| entry.status(now) != EntryStatus::Expired)
            .map(|(key, entry)| SnapshotEntry {
                key: key.to_key_string(),
                value: entry.value,
                fresh_until: entry.fresh_until,
                stale_until: entry.stale_until,
                hit: entry.hit,
            })
            .collect();

        let count = entries.len();
        let bytes = serde_json::to_vec(&SnapshotOut {
            version: SNAPSHOT_VERSION,
            resource: &self.inner.resource,
            entries,
        })
        .map_err(|e| CacheError::Serialization(e.to_string()))?;

        tracing::debug!(resource = %self.inner.resource, entries = count, bytes = bytes.len(), "cache dumped");
        Ok(bytes)
    }

    /// Load a snapshot produced by [`Cache::dump`] and return how many entries
    /// were restored.
    ///
    /// Entries already expired are skipped. Restored entries start a new fresh
    /// window, as if they had just been written. Nothing is written unless the
    /// whole snapshot decodes and every key parses.
    pub async fn restore(&self, bytes: &[u8]) -> Result<usize, CacheError> {
        let header: SnapshotHeader =
            serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))?;
        if header.version != SNAPSHOT_VERSION {
            return Err(CacheError::Serialization(format!(
                "unsupported snapshot version {} (expected {})",
                header.version, SNAPSHOT_VERSION
            )));
        }
        if header.resource != self.inner.resource {
            tracing::warn!(
                resource = %self.inner.resource,
                snapshot = %header.resource,
                "restoring a snapshot taken from another cache"
            );
        }

        let snapshot: SnapshotIn<V> =
            serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))?;

        let now = self.inner.clock.now_ms();
        let mut live = Vec::with_capacity(snapshot.entries.len());
        for entry in snapshot.entries {
            if now >= entry.stale_until {
                continue;
            }
            let key = K::parse_key(&entry.key)?;
            let value = match (entry.hit, entry.value) {
                (CacheHit::Hit, Some(value)) => Some(value),
                (CacheHit::Null, _) => None,
                (hit, _) => {
                    return Err(CacheError::Serialization(format!(
                        "entry '{}' has hit kind {:?} without a matching value",
                        entry.key, hit
                    )));
                }
            };
            live.push((key, value));
        }

        let restored = live.len();
        for (key, value) in live {
            match value {
                Some(value) => self.write_value(key, value).await,
                None => self.write_null(key).await,
            }
        }

        tracing::debug!(resource = %self.inner.resource, restored, "cache restored");
        Ok(restored)
    }
}
