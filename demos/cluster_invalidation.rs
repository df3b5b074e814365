//! Example showing two nodes keeping their caches coherent.
//!
//! Both "nodes" live in this process and share a `ChannelBroadcaster`. A write
//! on one node publishes an invalidation event; the other node's dispatcher
//! applies it through its registry, so the next read there goes back to the
//! origin instead of serving the old copy.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use swr_engine::{
    Cache, CacheConfig, CacheError, CacheHit, ChannelBroadcaster, Dispatcher,
    InvalidationRegistry, Op, SystemClock,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ApiKey {
    hash: String,
    workspace_id: String,
    enabled: bool,
}

fn node(
    id: &str,
    channel: &ChannelBroadcaster,
) -> Result<(Arc<InvalidationRegistry>, Cache<String, ApiKey>), CacheError> {
    let registry = Arc::new(InvalidationRegistry::new());
    let keys = Cache::builder(CacheConfig::new(
        "api_keys",
        Duration::from_secs(60),  // fresh for 60 seconds
        Duration::from_secs(300), // stale for 5 minutes
        10_000,
    ))
    .clock(Arc::new(SystemClock))
    .registry(registry.clone())
    .broadcaster(Arc::new(channel.clone()), id)
    .build()?;

    Dispatcher::new(registry.clone(), id).listen(channel.subscribe());
    Ok((registry, keys))
}

async fn load_key(hash: String, enabled: bool) -> Result<ApiKey, String> {
    println!("  loading {} from database", hash);
    Ok(ApiKey {
        hash,
        workspace_id: "ws_123".to_string(),
        enabled,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let channel = ChannelBroadcaster::new(1024);
    let (registry_a, node_a) = node("node-a", &channel)?;
    let (_registry_b, node_b) = node("node-b", &channel)?;

    // Both nodes read the key once and cache it
    for (name, cache) in [("a", &node_a), ("b", &node_b)] {
        let (key, hit) = cache
            .swr(
                "sk_abc".to_string(),
                |hash| load_key(hash, true),
                Op::write_on_success,
            )
            .await?;
        println!("node {}: {:?} ({:?})", name, key, hit);
    }

    // Node A disables the key and writes the new version directly
    println!("\nnode a disables sk_abc");
    node_a
        .set(
            "sk_abc".to_string(),
            ApiKey {
                hash: "sk_abc".to_string(),
                workspace_id: "ws_123".to_string(),
                enabled: false,
            },
        )
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Node B dropped its copy and reloads
    let (key, hit) = node_b.get(&"sk_abc".to_string()).await;
    println!("node b after invalidation: {:?} ({:?})", key, hit);
    assert_eq!(hit, CacheHit::Miss);

    let (key, _) = node_b
        .swr(
            "sk_abc".to_string(),
            |hash| load_key(hash, false),
            Op::write_on_success,
        )
        .await?;
    println!("node b reloaded: {:?}", key);

    // Admin-style invalidation by name, without access to the typed cache
    registry_a
        .invalidate("api_keys", &["sk_abc".to_string()])
        .await?;
    println!("\ncaches registered on node a: {:?}", registry_a.names());
    println!("node a after admin invalidation: {:?}", node_a.get(&"sk_abc".to_string()).await);

    Ok(())
}
