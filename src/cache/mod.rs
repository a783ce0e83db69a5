//! In-process caching: the tagged object store the content service reads
//! through, the LRU response cache wired in as middleware, and the key types
//! both are indexed by.

pub mod config;
pub mod keys;
pub mod lock;
pub mod middleware;
pub mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, ResponseKey};
pub use store::{CachedResponse, Lookup, ObjectStore, ResponseStore};
