//! Tunables for the cache layers and the warming client.

use std::time::Duration;

/// Validated cache settings, produced from the raw configuration tree.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied to collections without an explicit `revalidate`.
    pub default_ttl: Duration,
    /// Upper bound for a single provider fetch.
    pub fetch_timeout: Duration,
    /// Whether the HTTP response cache middleware is active.
    pub response_cache: bool,
    /// Capacity of the response cache, in entries.
    pub response_limit: usize,
    /// Upper bound for a single warming request.
    pub warm_timeout: Duration,
    /// Extra attempts per warmed path after the first fails to connect.
    pub warm_retries: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: crate::domain::DEFAULT_REVALIDATE,
            fetch_timeout: Duration::from_secs(12),
            response_cache: true,
            response_limit: 200,
            warm_timeout: Duration::from_secs(10),
            warm_retries: 0,
        }
    }
}
