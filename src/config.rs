use std::time::Duration;

use crate::error::CacheError;

/// Number of background refresh workers per cache unless configured otherwise.
pub const DEFAULT_WORKERS: usize = 10;

/// Refresh jobs that may wait for a worker before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Timing and sizing for one cache instance.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use swr_engine::CacheConfig;
///
/// let config = CacheConfig::new("api_keys", Duration::from_secs(60), Duration::from_secs(300), 10_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name used for metrics and for the invalidation registry. Must be unique
    /// per registry.
    pub resource: String,

    /// How long after a write an entry is served without touching the origin.
    pub fresh: Duration,

    /// How long after a write an entry may be served at all. Between `fresh`
    /// and `stale` reads trigger a background refresh.
    pub stale: Duration,

    /// Capacity of the default store.
    pub max_size: usize,

    /// Background refresh workers.
    pub workers: usize,

    /// Bounded refresh queue length.
    pub queue_capacity: usize,
}

impl CacheConfig {
    pub fn new(resource: impl Into<String>, fresh: Duration, stale: Duration, max_size: usize) -> Self {
        CacheConfig {
            resource: resource.into(),
            fresh,
            stale,
            max_size,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.resource.trim().is_empty() {
            return Err(CacheError::config("resource name must not be empty"));
        }
        if self.max_size == 0 {
            return Err(CacheError::config(format!(
                "[{}] max_size must be greater than zero",
                self.resource
            )));
        }
        if self.fresh > self.stale {
            return Err(CacheError::config(format!(
                "[{}] fresh window ({:?}) exceeds stale window ({:?})",
                self.resource, self.fresh, self.stale
            )));
        }
        if self.workers == 0 {
            return Err(CacheError::config(format!(
                "[{}] at least one refresh worker is required",
                self.resource
            )));
        }
        if self.queue_capacity == 0 {
            return Err(CacheError::config(format!(
                "[{}] queue_capacity must be greater than zero",
                self.resource
            )));
        }
        Ok(())
    }
}
