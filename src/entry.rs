use serde::{Deserialize, Serialize};

/// Outcome of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHit {
    /// Nothing usable is cached for the key. Never stored.
    Miss,
    /// A real value is cached.
    Hit,
    /// The origin confirmed the key does not exist.
    Null,
}

/// What to do with the outcome of an origin fetch.
///
/// Every cache operation that talks to the origin hands the fetch error (or
/// `None` on success) to a caller-supplied `Fn(Option<&E>) -> Op`, so each
/// cache decides which errors are worth caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Do not touch the cache, e.g. for transient infrastructure errors.
    Noop,
    /// Cache the fetched value as a hit.
    WriteValue,
    /// Cache a null, e.g. for a confirmed "not found".
    WriteNull,
}

impl Op {
    /// Cache the value on success and leave the cache alone on any error.
    pub fn write_on_success<E>(err: Option<&E>) -> Op {
        match err {
            None => Op::WriteValue,
            Some(_) => Op::Noop,
        }
    }
}

/// Where an entry is in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Before `fresh_until`.
    Fresh,
    /// Between `fresh_until` and `stale_until`: served, but due for a refresh.
    Stale,
    /// At or after `stale_until`: must not be served.
    Expired,
}

/// A cache entry containing a value and its expiration times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry<V> {
    /// The cached value, `None` for null entries.
    pub value: Option<V>,

    /// Unix timestamp in milliseconds.
    /// Before this time the entry is considered fresh and valid.
    pub fresh_until: i64,

    /// Unix timestamp in milliseconds.
    /// Do not use data after this point as it is considered no longer valid.
    pub stale_until: i64,

    /// `Hit` or `Null`.
    pub hit: CacheHit,
}

impl<V> Entry<V> {
    /// Create an entry holding a value.
    pub fn new(value: V, fresh_until: i64, stale_until: i64) -> Self {
        debug_assert!(fresh_until <= stale_until);
        Entry {
            value: Some(value),
            fresh_until,
            stale_until,
            hit: CacheHit::Hit,
        }
    }

    /// Create a negative entry.
    pub fn null(fresh_until: i64, stale_until: i64) -> Self {
        debug_assert!(fresh_until <= stale_until);
        Entry {
            value: None,
            fresh_until,
            stale_until,
            hit: CacheHit::Null,
        }
    }

    /// Check if the entry is still fresh (not yet stale).
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms < self.fresh_until
    }

    /// Check if the entry is stale but still usable.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        now_ms >= self.fresh_until && now_ms < self.stale_until
    }

    /// Check if the entry has expired and should not be used.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.stale_until
    }

    pub fn status(&self, now_ms: i64) -> EntryStatus {
        if self.is_fresh(now_ms) {
            EntryStatus::Fresh
        } else if self.is_stale(now_ms) {
            EntryStatus::Stale
        } else {
            EntryStatus::Expired
        }
    }
}
