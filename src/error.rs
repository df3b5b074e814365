/// Error type for cache operations.
///
/// Origin errors are never wrapped in this type; they are the caller's own error
/// type and are routed through the `Op` mapping function instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The cache could not be constructed from the given configuration.
    #[error("invalid cache configuration: {0}")]
    Config(String),
    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// No cache is registered under the given name.
    #[error("unknown cache name '{0}'")]
    UnknownCache(String),
    /// A string key could not be parsed into the cache's key type.
    #[error("invalid key '{key}': {message}")]
    InvalidKey { key: String, message: String },
    /// Publishing an invalidation event to the cluster failed.
    #[error("broadcast failed: {0}")]
    Broadcast(String),
}

impl CacheError {
    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        CacheError::Config(message.into())
    }

    /// Create a new key parse error.
    pub fn invalid_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::InvalidKey {
            key: key.into(),
            message: message.into(),
        }
    }
}
