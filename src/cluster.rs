//! Cross-node invalidation.
//!
//! A cache with a [`Broadcaster`] publishes an [`InvalidationEvent`] for every
//! direct write so other nodes drop their copies. On the receiving side a
//! [`Dispatcher`] applies events through the local [`InvalidationRegistry`],
//! ignoring the ones this node published itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::CacheError;
use crate::registry::InvalidationRegistry;

/// Keys of one cache that changed on `origin_node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub cache_name: String,
    pub keys: Vec<String>,
    pub origin_node: String,
}

impl InvalidationEvent {
    /// JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(self).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

/// Transport for invalidation events.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, event: InvalidationEvent) -> Result<(), CacheError>;
}

/// In-process transport over a tokio broadcast channel.
///
/// Useful for tests and for several logical nodes sharing one process.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<InvalidationEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        ChannelBroadcaster { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn broadcast(&self, event: InvalidationEvent) -> Result<(), CacheError> {
        if self.sender.send(event).is_err() {
            // Nobody listening yet
            tracing::debug!("invalidation event published with no subscribers");
        }
        Ok(())
    }
}

/// Applies remote invalidation events to the local registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<InvalidationRegistry>,
    node_id: String,
}

impl Dispatcher {
    pub fn new(registry: Arc<InvalidationRegistry>, node_id: impl Into<String>) -> Self {
        Dispatcher {
            registry,
            node_id: node_id.into(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Apply one event. Returns false if it came from this node and was
    /// skipped.
    pub async fn dispatch(&self, event: &InvalidationEvent) -> Result<bool, CacheError> {
        if event.origin_node == self.node_id {
            return Ok(false);
        }
        self.registry
            .invalidate(&event.cache_name, &event.keys)
            .await?;
        Ok(true)
    }

    /// Drain `receiver` on a background task until the channel closes.
    pub fn listen(self, mut receiver: broadcast::Receiver<InvalidationEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(node = %self.node_id, skipped, "invalidation listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                match self.dispatch(&event).await {
                    Ok(_) => {}
                    Err(CacheError::UnknownCache(name)) => {
                        tracing::debug!(node = %self.node_id, cache = %name, "no local cache for invalidation");
                    }
                    Err(e) => {
                        tracing::warn!(
                            node = %self.node_id,
                            cache = %event.cache_name,
                            error = %e,
                            "failed to apply invalidation"
                        );
                    }
                }
            }
            tracing::debug!(node = %self.node_id, "invalidation listener stopped");
        })
    }
}
