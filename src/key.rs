//! Keys that can cross process boundaries as strings.

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::CacheError;

/// A cache key that can be rendered to and parsed from a string.
///
/// The string form is what travels through the invalidation registry, the
/// cluster broadcaster and snapshots. Composite keys pick their own format:
///
/// ```
/// use swr_engine::{CacheError, CacheKey};
///
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// struct Scoped {
///     workspace: String,
///     name: String,
/// }
///
/// impl CacheKey for Scoped {
///     fn to_key_string(&self) -> String {
///         format!("{}:{}", self.workspace, self.name)
///     }
///
///     fn parse_key(raw: &str) -> Result<Self, CacheError> {
///         let (workspace, name) = raw
///             .split_once(':')
///             .ok_or_else(|| CacheError::invalid_key(raw, "expected workspace:name"))?;
///         Ok(Scoped { workspace: workspace.into(), name: name.into() })
///     }
/// }
///
/// let key = Scoped::parse_key("ws_1:api").unwrap();
/// assert_eq!(key.to_key_string(), "ws_1:api");
/// ```
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {
    fn to_key_string(&self) -> String;

    fn parse_key(raw: &str) -> Result<Self, CacheError>;
}

impl CacheKey for String {
    fn to_key_string(&self) -> String {
        self.clone()
    }

    fn parse_key(raw: &str) -> Result<Self, CacheError> {
        Ok(raw.to_string())
    }
}

macro_rules! integer_key {
    ($($ty:ty),*) => {
        $(
            impl CacheKey for $ty {
                fn to_key_string(&self) -> String {
                    self.to_string()
                }

                fn parse_key(raw: &str) -> Result<Self, CacheError> {
                    raw.parse()
                        .map_err(|e: std::num::ParseIntError| CacheError::invalid_key(raw, e.to_string()))
                }
            }
        )*
    };
}

integer_key!(u64, i64, u32, i32);
