//! Builder API for assembling a cache from its collaborators.
//!
//! A [`Cache`] needs a clock, a store, a metrics sink and a refresh pool, and
//! may join an invalidation registry and a cluster broadcaster. The builder
//! validates the configuration and fills in defaults for everything optional.

use std::sync::Arc;

use crate::cache::{Cache, CacheInner, ClusterLink};
use crate::clock::{Clock, duration_ms};
use crate::cluster::Broadcaster;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::metrics::{Metrics, NoopMetrics};
use crate::registry::{CacheInvalidator, InvalidationRegistry};
use crate::revalidate::{InflightSet, RefreshPool};
use crate::store::{DeletionCause, EvictionListener, Store};
use crate::stores::moka::{MokaStore, MokaStoreConfig};

type StoreFactory<K, V> = Box<dyn FnOnce(usize, EvictionListener) -> Arc<dyn Store<K, V>> + Send>;

enum StoreSource<K, V> {
    Default,
    Ready(Arc<dyn Store<K, V>>),
    Factory(StoreFactory<K, V>),
}

/// Builder for [`Cache`].
///
/// # Example
///
/// ```ignore
/// use swr_engine::{Cache, CacheConfig, HashMapStore, HashMapStoreConfig, InvalidationRegistry, SystemClock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let registry = Arc::new(InvalidationRegistry::new());
///
/// let users: Cache<u64, User> = Cache::builder(CacheConfig::new(
///     "users",
///     Duration::from_secs(60),
///     Duration::from_secs(300),
///     10_000,
/// ))
/// .clock(Arc::new(SystemClock))
/// .store_with(|max_items, listener| {
///     Arc::new(HashMapStore::with_listener(HashMapStoreConfig { max_items }, listener))
/// })
/// .registry(registry.clone())
/// .build()?;
/// ```
pub struct CacheBuilder<K: CacheKey, V> {
    config: CacheConfig,
    clock: Option<Arc<dyn Clock>>,
    store: StoreSource<K, V>,
    metrics: Arc<dyn Metrics>,
    registry: Option<Arc<InvalidationRegistry>>,
    cluster: Option<ClusterLink>,
    pool: Option<RefreshPool>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        CacheBuilder {
            config,
            clock: None,
            store: StoreSource::Default,
            metrics: Arc::new(NoopMetrics),
            registry: None,
            cluster: None,
            pool: None,
        }
    }

    /// Time source for every freshness decision. Required.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an already constructed store.
    ///
    /// The store's own evictions are only reported if it was created with a
    /// listener; see [`CacheBuilder::store_with`].
    pub fn store(mut self, store: Arc<dyn Store<K, V>>) -> Self {
        self.store = StoreSource::Ready(store);
        self
    }

    /// Construct the store at build time from the configured `max_size` and a
    /// listener that feeds the cache's deletion metrics.
    pub fn store_with<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(usize, EvictionListener) -> Arc<dyn Store<K, V>> + Send + 'static,
    {
        self.store = StoreSource::Factory(Box::new(factory));
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register the cache under its resource name so it can be invalidated
    /// by name.
    pub fn registry(mut self, registry: Arc<InvalidationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Publish direct writes to other nodes as `node_id`.
    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>, node_id: impl Into<String>) -> Self {
        self.cluster = Some(ClusterLink {
            broadcaster,
            node_id: node_id.into(),
        });
        self
    }

    /// Share a refresh pool with other caches. `workers` and `queue_capacity`
    /// from the config are ignored.
    pub fn pool(mut self, pool: RefreshPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validate the configuration and assemble the cache.
    ///
    /// Unless a pool was provided this spawns refresh workers, so it must be
    /// called inside a Tokio runtime.
    pub fn build(self) -> Result<Cache<K, V>, CacheError> {
        let config = self.config;
        config.validate()?;

        let clock = self
            .clock
            .ok_or_else(|| CacheError::config(format!("[{}] a clock is required", config.resource)))?;

        let pool = match self.pool {
            Some(pool) => pool,
            None => {
                if tokio::runtime::Handle::try_current().is_err() {
                    return Err(CacheError::config(format!(
                        "[{}] must be built inside a Tokio runtime",
                        config.resource
                    )));
                }
                RefreshPool::new(config.workers, config.queue_capacity)
            }
        };

        let listener: EvictionListener = {
            let metrics = self.metrics.clone();
            let resource = config.resource.clone();
            Arc::new(move |cause: DeletionCause| metrics.record_deleted(&resource, cause.as_str()))
        };

        let store: Arc<dyn Store<K, V>> = match self.store {
            StoreSource::Default => Arc::new(MokaStore::with_listener(
                MokaStoreConfig {
                    max_capacity: config.max_size as u64,
                    time_to_idle: None,
                },
                listener,
            )),
            StoreSource::Ready(store) => store,
            StoreSource::Factory(factory) => factory(config.max_size, listener),
        };

        let cache = Cache {
            inner: Arc::new(CacheInner {
                resource: config.resource.clone(),
                fresh_ms: duration_ms(config.fresh),
                stale_ms: duration_ms(config.stale),
                store,
                clock,
                metrics: self.metrics,
                inflight: InflightSet::new(),
                pool,
                cluster: self.cluster,
            }),
        };

        if let Some(registry) = &self.registry {
            registry.register(config.resource.clone(), Arc::new(CacheInvalidator::new(&cache)))?;
        }

        tracing::debug!(
            resource = %config.resource,
            store = cache.inner.store.name(),
            fresh_ms = cache.inner.fresh_ms,
            stale_ms = cache.inner.stale_ms,
            "cache built"
        );
        Ok(cache)
    }
}
