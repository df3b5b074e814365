//! swr-engine - An in-process stale-while-revalidate (SWR) cache engine
//!
//! This library provides typed, per-resource caches with:
//! - Stale-while-revalidate semantics with a fresh and a stale window
//! - Negative caching: "does not exist" is cached as a `Null` hit
//! - Caller-defined error policy through [`Op`]
//! - Single-flight background revalidation on a bounded worker pool
//! - Batch and fallback-key lookups
//! - Invalidation by cache name and string keys, locally or across nodes
//! - Snapshot dump and restore
//!
//! # Example
//!
//! ```ignore
//! use swr_engine::{Cache, CacheConfig, CacheHit, Op, SystemClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users: Cache<u64, String> = Cache::builder(CacheConfig::new(
//!         "users",
//!         Duration::from_secs(60),
//!         Duration::from_secs(300),
//!         10_000,
//!     ))
//!     .clock(Arc::new(SystemClock))
//!     .build()?;
//!
//!     // SWR pattern - callback receives the actual key
//!     let (user, hit) = users
//!         .swr(123, |id| async move { db::load_user(id).await }, |err| match err {
//!             None => Op::WriteValue,
//!             Some(db::Error::NotFound) => Op::WriteNull,
//!             Some(_) => Op::Noop,
//!         })
//!         .await?;
//!
//!     if hit == CacheHit::Null {
//!         println!("user 123 does not exist");
//!     }
//!     Ok(())
//! }
//! ```

mod builder;
mod cache;
mod clock;
mod cluster;
mod config;
mod entry;
mod error;
mod fallback;
mod key;
mod many;
mod metrics;
mod registry;
mod revalidate;
mod snapshot;
mod store;
pub mod stores;
mod swr;

// Re-export public API
pub use builder::CacheBuilder;
pub use cache::Cache;
pub use clock::{Clock, SystemClock, TestClock};
pub use cluster::{Broadcaster, ChannelBroadcaster, Dispatcher, InvalidationEvent};
pub use config::{CacheConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
pub use entry::{CacheHit, Entry, EntryStatus, Op};
pub use error::CacheError;
pub use key::CacheKey;
pub use many::Many;
pub use metrics::{CacheMetric, Metrics, NoopMetrics, RecordingMetrics};
pub use registry::{InvalidationRegistry, Invalidator};
pub use revalidate::RefreshPool;
pub use snapshot::SNAPSHOT_VERSION;
pub use store::{DeletionCause, EvictionListener, Store};
pub use stores::memory::{HashMapStore, HashMapStoreConfig};
pub use stores::moka::{MokaStore, MokaStoreConfig};
