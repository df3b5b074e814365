//! Name-based invalidation.
//!
//! Out-of-band code (admin endpoints, the cluster dispatcher) often only knows
//! a cache by name and its keys as strings. The registry maps names to type
//! erased [`Invalidator`]s that parse the keys and remove them locally.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use std::sync::{Arc, Weak};

use crate::cache::{Cache, CacheInner};
use crate::error::CacheError;
use crate::key::CacheKey;

/// Removes string keys from a cache it knows how to parse them for.
#[async_trait]
pub trait Invalidator: Send + Sync {
    /// Parse every key, then remove them all. A key that fails to parse aborts
    /// before anything is removed.
    async fn invalidate(&self, keys: &[String]) -> Result<(), CacheError>;

    /// False once the target cache is gone.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Cache name to invalidator map.
///
/// Shared explicitly as `Arc<InvalidationRegistry>`; there is no global
/// instance.
#[derive(Default)]
pub struct InvalidationRegistry {
    entries: DashMap<String, Arc<dyn Invalidator>>,
}

impl InvalidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `invalidator` under `name`.
    ///
    /// A name held by a live invalidator is a configuration error. A name
    /// whose cache has been dropped can be taken over.
    pub fn register(
        &self,
        name: impl Into<String>,
        invalidator: Arc<dyn Invalidator>,
    ) -> Result<(), CacheError> {
        let name = name.into();
        match self.entries.entry(name) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_alive() {
                    return Err(CacheError::config(format!(
                        "cache '{}' is already registered",
                        occupied.key()
                    )));
                }
                tracing::debug!(cache = %occupied.key(), "replacing dropped cache registration");
                occupied.insert(invalidator);
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(invalidator);
            }
        }
        Ok(())
    }

    /// Remove `keys` from the cache registered as `name`.
    pub async fn invalidate(&self, name: &str, keys: &[String]) -> Result<(), CacheError> {
        // Clone out so no map shard lock is held across the await.
        let invalidator = self
            .entries
            .get(name)
            .map(|entry| entry.value().clone())
            .filter(|invalidator| invalidator.is_alive())
            .ok_or_else(|| CacheError::UnknownCache(name.to_string()))?;

        invalidator.invalidate(keys).await?;
        tracing::debug!(cache = name, keys = keys.len(), "invalidated keys");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(|entry| entry.value().is_alive())
    }

    /// Names of live caches, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_alive())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

/// Registry entry for a typed cache. Holds it weakly so registering never
/// keeps a cache alive.
pub(crate) struct CacheInvalidator<K: CacheKey, V> {
    name: String,
    inner: Weak<CacheInner<K, V>>,
}

impl<K, V> CacheInvalidator<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(cache: &Cache<K, V>) -> Self {
        CacheInvalidator {
            name: cache.name().to_string(),
            inner: Arc::downgrade(&cache.inner),
        }
    }
}

#[async_trait]
impl<K, V> Invalidator for CacheInvalidator<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    async fn invalidate(&self, keys: &[String]) -> Result<(), CacheError> {
        let parsed = keys
            .iter()
            .map(|raw| K::parse_key(raw))
            .collect::<Result<Vec<K>, CacheError>>()?;

        let Some(inner) = self.inner.upgrade() else {
            return Err(CacheError::UnknownCache(self.name.clone()));
        };
        Cache { inner }.remove_local(&parsed).await;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}
