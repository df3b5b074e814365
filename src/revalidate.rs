//! Background revalidation plumbing: a bounded queue drained by a fixed set of
//! worker tasks, and the inflight set that keeps refreshes single-flight.

use dashmap::DashSet;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// A queued refresh.
pub(crate) type RefreshJob = BoxFuture<'static, ()>;

/// A fixed pool of workers draining one bounded queue of refresh jobs.
///
/// Jobs run on their own tasks, detached from whichever request queued them,
/// so dropping the caller's future never cancels a refresh. Submission never
/// waits: when the queue is full the job is dropped and the next stale read
/// tries again.
///
/// The workers stop once every clone of the pool (and every cache using it)
/// has been dropped and the queue is drained.
#[derive(Clone)]
pub struct RefreshPool {
    sender: mpsc::Sender<RefreshJob>,
}

impl RefreshPool {
    /// Spawn `workers` tasks on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime or with a zero
    /// `queue_capacity`. `CacheBuilder::build` checks both and returns an error
    /// instead.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<RefreshJob>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for worker in 0..workers {
            let receiver = receiver.clone();
            tokio::spawn(async move {
                loop {
                    let job = receiver.lock().await.recv().await;
                    let Some(job) = job else {
                        break;
                    };
                    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                        tracing::warn!(worker, "refresh job panicked");
                    }
                }
                tracing::debug!(worker, "refresh worker stopped");
            });
        }

        RefreshPool { sender }
    }

    /// Queue a job without waiting. Returns false if it was dropped.
    pub(crate) fn try_submit(&self, job: RefreshJob) -> bool {
        self.sender.try_send(job).is_ok()
    }
}

/// Keys with a refresh currently queued or running.
pub(crate) struct InflightSet<K: Eq + Hash> {
    keys: DashSet<K>,
}

impl<K> InflightSet<K>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(InflightSet {
            keys: DashSet::new(),
        })
    }

    /// Mark `key`, or return `None` if someone else already holds it.
    pub(crate) fn try_acquire(self: &Arc<Self>, key: K) -> Option<InflightGuard<K>> {
        if !self.keys.insert(key.clone()) {
            return None;
        }
        Some(InflightGuard {
            set: self.clone(),
            keys: vec![key],
        })
    }

    /// Mark every key that is not already held. The guard may be empty.
    pub(crate) fn acquire_available(
        self: &Arc<Self>,
        keys: impl IntoIterator<Item = K>,
    ) -> InflightGuard<K> {
        let keys = keys
            .into_iter()
            .filter(|key| self.keys.insert(key.clone()))
            .collect();
        InflightGuard {
            set: self.clone(),
            keys,
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }
}

/// Releases its keys from the inflight set when dropped, whether the refresh
/// finished, failed, panicked, or never got queued.
pub(crate) struct InflightGuard<K: Eq + Hash> {
    set: Arc<InflightSet<K>>,
    keys: Vec<K>,
}

impl<K: Eq + Hash> InflightGuard<K> {
    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Eq + Hash> Drop for InflightGuard<K> {
    fn drop(&mut self) {
        for key in &self.keys {
            let released = self.set.keys.remove(key);
            debug_assert!(released.is_some(), "released an inflight key that was never marked");
        }
    }
}
