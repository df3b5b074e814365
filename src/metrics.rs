//! Metrics hooks for cache instances.
//!
//! The cache reports reads, deletions, background revalidations and store
//! occupancy to a [`Metrics`] implementation, tagged with the cache's resource
//! name. Exporting them is up to the implementation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swr_engine::{Cache, CacheConfig, RecordingMetrics, SystemClock};
//!
//! let metrics = Arc::new(RecordingMetrics::new());
//! let cache: Cache<String, String> = Cache::builder(config)
//!     .clock(Arc::new(SystemClock))
//!     .metrics(metrics.clone())
//!     .build()?;
//!
//! cache.get(&"user:1".to_string()).await;
//! assert_eq!(metrics.take().len(), 1);
//! ```

use std::sync::Mutex;

/// Receiver for cache metrics.
///
/// Called synchronously in the hot path of cache operations, so
/// implementations should be fast (e.g., bump an atomic counter).
pub trait Metrics: Send + Sync {
    /// A lookup finished; `hit` is false for misses.
    fn record_read(&self, resource: &str, hit: bool);

    /// An entry left the cache. `reason` is a `DeletionCause` label.
    fn record_deleted(&self, resource: &str, reason: &str);

    /// A background refresh finished for `count` keys.
    fn record_revalidation(&self, resource: &str, count: usize);

    /// Store occupancy after a write.
    fn record_size_and_capacity(&self, resource: &str, size: usize, capacity: usize);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn record_read(&self, _resource: &str, _hit: bool) {}

    fn record_deleted(&self, _resource: &str, _reason: &str) {}

    fn record_revalidation(&self, _resource: &str, _count: usize) {}

    fn record_size_and_capacity(&self, _resource: &str, _size: usize, _capacity: usize) {}
}

/// A single recorded metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMetric {
    Read {
        resource: String,
        hit: bool,
    },
    Deleted {
        resource: String,
        reason: String,
    },
    Revalidation {
        resource: String,
        count: usize,
    },
    SizeAndCapacity {
        resource: String,
        size: usize,
        capacity: usize,
    },
}

/// Buffers every metric in memory, for tests and debugging.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    metrics: Mutex<Vec<CacheMetric>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<CacheMetric> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of recorded reads with the given outcome.
    pub fn reads(&self, hit: bool) -> usize {
        self.lock()
            .iter()
            .filter(|m| matches!(m, CacheMetric::Read { hit: h, .. } if *h == hit))
            .count()
    }

    /// Number of recorded deletions with the given reason.
    pub fn deletions(&self, reason: &str) -> usize {
        self.lock()
            .iter()
            .filter(|m| matches!(m, CacheMetric::Deleted { reason: r, .. } if r == reason))
            .count()
    }

    /// Total number of keys revalidated in the background.
    pub fn revalidated(&self) -> usize {
        self.lock()
            .iter()
            .map(|m| match m {
                CacheMetric::Revalidation { count, .. } => *count,
                _ => 0,
            })
            .sum()
    }

    fn push(&self, metric: CacheMetric) {
        self.lock().push(metric);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CacheMetric>> {
        // A poisoned buffer still holds valid metrics.
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Metrics for RecordingMetrics {
    fn record_read(&self, resource: &str, hit: bool) {
        self.push(CacheMetric::Read {
            resource: resource.to_string(),
            hit,
        });
    }

    fn record_deleted(&self, resource: &str, reason: &str) {
        self.push(CacheMetric::Deleted {
            resource: resource.to_string(),
            reason: reason.to_string(),
        });
    }

    fn record_revalidation(&self, resource: &str, count: usize) {
        self.push(CacheMetric::Revalidation {
            resource: resource.to_string(),
            count,
        });
    }

    fn record_size_and_capacity(&self, resource: &str, size: usize, capacity: usize) {
        self.push(CacheMetric::SizeAndCapacity {
            resource: resource.to_string(),
            size,
            capacity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_metrics_buffers_in_order() {
        let metrics = RecordingMetrics::new();
        metrics.record_read("users", true);
        metrics.record_deleted("users", "expired");
        metrics.record_revalidation("users", 3);
        metrics.record_size_and_capacity("users", 1, 10);

        let recorded = metrics.take();
        assert_eq!(recorded.len(), 4);
        assert_eq!(
            recorded[0],
            CacheMetric::Read {
                resource: "users".into(),
                hit: true
            }
        );
        assert_eq!(
            recorded[3],
            CacheMetric::SizeAndCapacity {
                resource: "users".into(),
                size: 1,
                capacity: 10
            }
        );

        // Drained
        assert!(metrics.take().is_empty());
    }

    #[test]
    fn test_recording_metrics_counters() {
        let metrics = RecordingMetrics::new();
        metrics.record_read("r", true);
        metrics.record_read("r", false);
        metrics.record_read("r", false);
        metrics.record_deleted("r", "explicit");
        metrics.record_revalidation("r", 2);
        metrics.record_revalidation("r", 5);

        assert_eq!(metrics.reads(true), 1);
        assert_eq!(metrics.reads(false), 2);
        assert_eq!(metrics.deletions("explicit"), 1);
        assert_eq!(metrics.deletions("capacity"), 0);
        assert_eq!(metrics.revalidated(), 7);
    }
}
