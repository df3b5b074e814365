//! Store implementations for the cache library.

pub mod memory;
pub mod moka;

pub use memory::{HashMapStore, HashMapStoreConfig};
pub use moka::{MokaStore, MokaStoreConfig};
