//! Integration tests for swr-engine with the HashMap and Moka stores.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use swr_engine::{
    Cache, CacheConfig, CacheError, CacheHit, HashMapStore, HashMapStoreConfig, MokaStore,
    MokaStoreConfig, Op, RecordingMetrics, Store, TestClock,
};

// ============================================================================
// Test Types
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[derive(Debug, Clone, PartialEq)]
enum DbError {
    NotFound,
    Unavailable,
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::NotFound => write!(f, "not found"),
            DbError::Unavailable => write!(f, "database unavailable"),
        }
    }
}

/// Cache misses for "not found", leave the cache alone for anything else.
fn user_op(err: Option<&DbError>) -> Op {
    match err {
        None => Op::WriteValue,
        Some(DbError::NotFound) => Op::WriteNull,
        Some(DbError::Unavailable) => Op::Noop,
    }
}

// ============================================================================
// Fake Database
// ============================================================================

#[derive(Clone)]
struct FakeUserDb {
    users: Arc<HashMap<u64, User>>,
    calls: Arc<AtomicUsize>,
}

impl FakeUserDb {
    fn new() -> Self {
        let users = [(1, "Alice"), (2, "Bob"), (3, "Charlie")]
            .into_iter()
            .map(|(id, name)| {
                (
                    id,
                    User {
                        id,
                        name: name.into(),
                        email: format!("{}@example.com", name.to_lowercase()),
                    },
                )
            })
            .collect();
        FakeUserDb {
            users: Arc::new(users),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn find(&self, id: u64) -> Result<User, DbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.users.get(&id).cloned().ok_or(DbError::NotFound)
    }

    async fn find_many(&self, ids: Vec<u64>) -> Result<HashMap<u64, User>, DbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .into_iter()
            .filter_map(|id| self.users.get(&id).map(|u| (id, u.clone())))
            .collect())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn users_config() -> CacheConfig {
    CacheConfig::new(
        "users",
        Duration::from_secs(60),
        Duration::from_secs(300),
        1_000,
    )
}

fn hashmap_cache<K: swr_engine::CacheKey, V: Clone + Send + Sync + 'static>(
    clock: Arc<TestClock>,
) -> Cache<K, V> {
    Cache::builder(users_config())
        .clock(clock)
        .store(Arc::new(HashMapStore::new(HashMapStoreConfig::default())))
        .build()
        .unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_fresh_stale_expired_lifecycle() {
    let clock = Arc::new(TestClock::at(0));
    let cache: Cache<String, String> = hashmap_cache(clock.clone());
    let refreshes = Arc::new(AtomicUsize::new(0));
    let key = "k".to_string();

    cache.set(key.clone(), "v".to_string()).await;
    assert_eq!(cache.get(&key).await, (Some("v".to_string()), CacheHit::Hit));

    // Two minutes in: stale, served, refreshed once in the background
    clock.tick(Duration::from_secs(120));
    let counter = refreshes.clone();
    let result = cache
        .swr(
            key.clone(),
            move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(DbError::Unavailable)
            },
            user_op,
        )
        .await
        .unwrap();
    assert_eq!(result, (Some("v".to_string()), CacheHit::Hit));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    // Six minutes in: gone
    clock.tick(Duration::from_secs(240));
    assert_eq!(cache.get(&key).await, (None, CacheHit::Miss));
}

#[tokio::test]
async fn test_not_found_is_cached_as_null() {
    let cache: Cache<u64, User> = hashmap_cache(Arc::new(TestClock::new()));
    let db = FakeUserDb::new();

    let origin = db.clone();
    let err = cache
        .swr(42, move |id| async move { origin.find(id).await }, user_op)
        .await
        .unwrap_err();
    assert_eq!(err, DbError::NotFound);

    assert_eq!(cache.get(&42).await, (None, CacheHit::Null));

    let origin = db.clone();
    let result = cache
        .swr(42, move |id| async move { origin.find(id).await }, user_op)
        .await
        .unwrap();
    assert_eq!(result, (None, CacheHit::Null));
    assert_eq!(db.calls(), 1);
}

#[tokio::test]
async fn test_swr_many_fills_nulls_for_missing_keys() {
    let cache: Cache<u64, User> = hashmap_cache(Arc::new(TestClock::new()));
    let db = FakeUserDb::new();
    let ids = [1, 2, 98, 99];

    let origin = db.clone();
    let (values, hits) = cache
        .swr_many(
            &ids,
            move |ids| {
                let db = origin.clone();
                async move { db.find_many(ids).await }
            },
            user_op,
        )
        .await
        .unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values[&1].name, "Alice");
    assert_eq!(hits[&1], CacheHit::Hit);
    assert_eq!(hits[&2], CacheHit::Hit);
    assert_eq!(hits[&98], CacheHit::Null);
    assert_eq!(hits[&99], CacheHit::Null);

    let origin = db.clone();
    let (values, hits) = cache
        .swr_many(
            &ids,
            move |ids| {
                let db = origin.clone();
                async move { db.find_many(ids).await }
            },
            user_op,
        )
        .await
        .unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(hits.len(), 4);
    assert_eq!(db.calls(), 1);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stale_reads_refresh_once() {
    let clock = Arc::new(TestClock::new());
    let cache: Cache<u64, User> = hashmap_cache(clock.clone());
    let db = FakeUserDb::new();

    cache
        .set(
            1,
            User {
                id: 1,
                name: "Old Alice".into(),
                email: "old@example.com".into(),
            },
        )
        .await;
    clock.tick(Duration::from_secs(90));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let cache = cache.clone();
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            cache
                .swr(
                    1,
                    move |id| async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        db.find(id).await
                    },
                    user_op,
                )
                .await
        }));
    }

    for handle in handles {
        let (user, hit) = handle.await.unwrap().unwrap();
        assert_eq!(hit, CacheHit::Hit);
        assert_eq!(user.unwrap().name, "Old Alice");
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(db.calls(), 1);
    assert_eq!(cache.get(&1).await.0.unwrap().name, "Alice");
}

#[tokio::test]
async fn test_stale_read_does_not_wait_for_refresh() {
    let clock = Arc::new(TestClock::new());
    let cache: Cache<u64, String> = hashmap_cache(clock.clone());
    cache.set(7, "old".to_string()).await;
    clock.tick(Duration::from_secs(90));

    // The origin takes 30ms but the stale read returns immediately
    let result = tokio::time::timeout(
        Duration::from_millis(1),
        cache.swr(
            7,
            |_| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<_, DbError>("new".to_string())
            },
            user_op,
        ),
    )
    .await;
    assert!(result.is_ok());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.get(&7).await.0.as_deref(), Some("new"));
}

#[tokio::test]
async fn test_unavailable_origin_returns_error_without_caching() {
    let cache: Cache<u64, User> = hashmap_cache(Arc::new(TestClock::new()));

    let err = cache
        .swr(1, |_| async { Err::<User, _>(DbError::Unavailable) }, user_op)
        .await
        .unwrap_err();

    assert_eq!(err, DbError::Unavailable);
    assert_eq!(cache.get(&1).await, (None, CacheHit::Miss));
}

// ============================================================================
// Fallback Lookups
// ============================================================================

#[tokio::test]
async fn test_fallback_writes_canonical_key_only() {
    let cache: Cache<String, User> = hashmap_cache(Arc::new(TestClock::new()));
    let db = FakeUserDb::new();
    let candidates = vec!["email:bob@example.com".to_string(), "id:2".to_string()];

    let origin = db.clone();
    let (user, hit) = cache
        .swr_with_fallback(
            &candidates,
            move || async move { ("id:2".to_string(), origin.find(2).await) },
            user_op,
        )
        .await
        .unwrap();

    assert_eq!(hit, CacheHit::Hit);
    assert_eq!(user.unwrap().name, "Bob");
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&"id:2".to_string()).await.1, CacheHit::Hit);

    // Now served from the second candidate without touching the origin
    let origin = db.clone();
    let (user, _) = cache
        .swr_with_fallback(
            &candidates,
            move || async move { ("id:2".to_string(), origin.find(2).await) },
            user_op,
        )
        .await
        .unwrap();
    assert_eq!(user.unwrap().id, 2);
    assert_eq!(db.calls(), 1);
}

// ============================================================================
// Snapshots
// ============================================================================

#[tokio::test]
async fn test_dump_restore_round_trip() {
    let clock = Arc::new(TestClock::new());
    let source: Cache<u64, User> = hashmap_cache(clock.clone());
    let db = FakeUserDb::new();

    for id in [1, 2, 404] {
        let origin = db.clone();
        let _ = source
            .swr(id, move |id| async move { origin.find(id).await }, user_op)
            .await;
    }

    let bytes = source.dump().await.unwrap();
    let target: Cache<u64, User> = hashmap_cache(clock.clone());
    assert_eq!(target.restore(&bytes).await.unwrap(), 3);

    assert_eq!(target.get(&1).await.0.unwrap().name, "Alice");
    assert_eq!(target.get(&2).await.0.unwrap().name, "Bob");
    assert_eq!(target.get(&404).await, (None, CacheHit::Null));
}

#[tokio::test]
async fn test_restore_rejects_other_versions() {
    let cache: Cache<u64, User> = hashmap_cache(Arc::new(TestClock::new()));
    let result = cache
        .restore(br#"{"version":0,"resource":"users","entries":[]}"#)
        .await;
    assert!(matches!(result, Err(CacheError::Serialization(_))));
}

// ============================================================================
// Moka Store
// ============================================================================

#[tokio::test]
async fn test_moka_store_swr_and_capacity_metrics() {
    let metrics = Arc::new(RecordingMetrics::new());
    let config = CacheConfig::new("users", Duration::from_secs(60), Duration::from_secs(300), 5);
    let store: Arc<MokaStore<u64, User>> = Arc::new(MokaStore::new(MokaStoreConfig {
        max_capacity: 5,
        time_to_idle: None,
    }));
    let cache: Cache<u64, User> = Cache::builder(config)
        .clock(Arc::new(TestClock::new()))
        .metrics(metrics.clone())
        .store(store.clone())
        .build()
        .unwrap();

    let db = FakeUserDb::new();
    let origin = db.clone();
    let (user, hit) = cache
        .swr(3, move |id| async move { origin.find(id).await }, user_op)
        .await
        .unwrap();
    assert_eq!(hit, CacheHit::Hit);
    assert_eq!(user.unwrap().name, "Charlie");

    store.sync().await;
    assert_eq!(store.len(), 1);
    assert_eq!(metrics.reads(false), 1);
}
