use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use swr_engine::Op;

/// Test data structure for benchmarks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub score: u32,
}

impl BenchUser {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            score: (id % 1000) as u32,
        }
    }
}

/// The only error the fake database produces.
#[derive(Debug, Clone, PartialEq)]
pub struct NotFound(pub u64);

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} not found", self.0)
    }
}

/// Cache found users and negative-cache unknown ids.
pub fn user_op(err: Option<&NotFound>) -> Op {
    match err {
        None => Op::WriteValue,
        Some(_) => Op::WriteNull,
    }
}

/// Simulated database with configurable latency
#[derive(Clone)]
pub struct FakeDatabase {
    data: Arc<HashMap<u64, BenchUser>>,
    latency_ms: u64,
    query_count: Arc<AtomicUsize>,
}

impl FakeDatabase {
    pub fn new(num_users: usize, latency_ms: u64) -> Self {
        let data = (0..num_users as u64)
            .map(|id| (id, BenchUser::new(id)))
            .collect();

        Self {
            data: Arc::new(data),
            latency_ms,
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn get(&self, id: u64) -> Result<BenchUser, NotFound> {
        self.query_count.fetch_add(1, Ordering::Relaxed);

        // Simulate database latency
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;

        self.data.get(&id).cloned().ok_or(NotFound(id))
    }

    /// One round trip for many ids. Unknown ids are simply absent.
    pub async fn get_many(&self, ids: Vec<u64>) -> Result<HashMap<u64, BenchUser>, NotFound> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;

        Ok(ids
            .into_iter()
            .filter_map(|id| self.data.get(&id).map(|user| (id, user.clone())))
            .collect())
    }

    #[allow(dead_code)]
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }

    #[allow(dead_code)]
    pub fn reset_count(&self) {
        self.query_count.store(0, Ordering::Relaxed);
    }
}

/// Generate test keys for different workload patterns
pub struct KeyGenerator {
    num_keys: usize,
}

impl KeyGenerator {
    pub fn new(num_keys: usize) -> Self {
        Self { num_keys }
    }

    /// Generate sequential keys (for cold cache tests)
    pub fn sequential(&self) -> Vec<u64> {
        (0..self.num_keys as u64).collect()
    }

    /// Generate random keys with uniform distribution
    #[allow(dead_code)]
    pub fn uniform_random(&self, count: usize) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| rng.gen_range(0..self.num_keys as u64))
            .collect()
    }

    /// Generate keys with Zipf distribution (realistic - few hot keys)
    pub fn zipf_random(&self, count: usize) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        let hot = (self.num_keys / 5) as u64;

        (0..count)
            .map(|_| {
                // Simplified Zipf: 80% of requests go to 20% of keys
                if rng.gen_bool(0.8) {
                    rng.gen_range(0..hot)
                } else {
                    rng.gen_range(hot..self.num_keys as u64)
                }
            })
            .collect()
    }

    /// Generate keys for mixed workload (some hits, some misses). Ids past
    /// `num_keys` do not exist in the database.
    pub fn mixed(&self, hit_ratio: f64) -> Vec<u64> {
        let mut rng = rand::thread_rng();
        let n = self.num_keys as u64;

        (0..1000)
            .map(|_| {
                if rng.gen_bool(hit_ratio) {
                    rng.gen_range(0..n)
                } else {
                    rng.gen_range(n..n * 2)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn test_fake_database() {
        use super::{FakeDatabase, NotFound};

        let db = FakeDatabase::new(100, 1);

        let user = db.get(0).await.unwrap();
        assert_eq!(user.id, 0);
        assert_eq!(db.get(500).await, Err(NotFound(500)));

        let found = db.get_many(vec![1, 2, 500]).await.unwrap();
        assert_eq!(found.len(), 2);

        assert_eq!(db.query_count(), 3);
    }

    #[test]
    fn test_key_generator() {
        use super::KeyGenerator;

        let key_gen = KeyGenerator::new(100);

        let seq = key_gen.sequential();
        assert_eq!(seq.len(), 100);
        assert_eq!(seq[0], 0);

        let uniform = key_gen.uniform_random(50);
        assert_eq!(uniform.len(), 50);

        let zipf = key_gen.zipf_random(100);
        assert_eq!(zipf.len(), 100);
        assert!(zipf.iter().all(|id| *id < 100));
    }
}
