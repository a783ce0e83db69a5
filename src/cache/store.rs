//! The two cache stores.
//!
//! [`ObjectStore`] holds decoded content objects with a TTL and a set of tags,
//! including negative entries for failed fetches. [`ResponseStore`] holds
//! rendered HTTP responses in an LRU keyed by path and query hash.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use serde_json::Value;

use super::keys::{CacheKey, ResponseKey};
use super::lock::{rw_read, rw_write};

#[derive(Debug, Clone)]
struct ObjectEntry {
    /// `None` records a failed or empty fetch so it is not retried until the
    /// entry expires.
    value: Option<Value>,
    expires_at: Instant,
    tags: HashSet<String>,
}

/// Outcome of an object store lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A live entry; `None` is a cached negative result.
    Fresh(Option<Value>),
    /// The entry exists but its TTL has elapsed.
    Stale,
    Miss,
}

/// Every this many writes the store drops all expired entries, so keys that
/// are written once and never read again (failed slug probes, mostly) cannot
/// grow the map forever.
const SWEEP_INTERVAL: usize = 64;

/// Tagged, TTL-bound store for content objects.
#[derive(Debug, Default)]
pub struct ObjectStore {
    entries: RwLock<HashMap<CacheKey, ObjectEntry>>,
    writes: AtomicUsize,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a key up; an expired entry is removed on the way out.
    pub fn get(&self, key: &CacheKey) -> Lookup {
        {
            let entries = rw_read(&self.entries, "object_store");
            match entries.get(key) {
                Some(entry) if Instant::now() < entry.expires_at => {
                    return Lookup::Fresh(entry.value.clone());
                }
                Some(_) => {}
                None => return Lookup::Miss,
            }
        }
        let mut entries = rw_write(&self.entries, "object_store");
        if let Some(entry) = entries.get(key) {
            // Another flight may have refreshed it between the locks.
            if Instant::now() < entry.expires_at {
                return Lookup::Fresh(entry.value.clone());
            }
            entries.remove(key);
        }
        Lookup::Stale
    }

    pub fn put(&self, key: CacheKey, value: Option<Value>, ttl: Duration, tags: HashSet<String>) {
        let entry = ObjectEntry {
            value,
            expires_at: Instant::now() + ttl,
            tags,
        };
        let mut entries = rw_write(&self.entries, "object_store");
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            let now = Instant::now();
            entries.retain(|_, entry| now < entry.expires_at);
        }
        entries.insert(key, entry);
    }

    /// Drops every entry carrying the tag and returns how many were dropped.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut entries = rw_write(&self.entries, "object_store");
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.contains(tag));
        let dropped = before - entries.len();
        if dropped > 0 {
            metrics::counter!("brezza_object_cache_invalidations_total")
                .increment(dropped as u64);
        }
        dropped
    }

    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        rw_write(&self.entries, "object_store").remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "object_store").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One cached HTTP response, enough to replay it byte for byte.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// LRU cache of rendered responses, keyed by path plus query hash.
#[derive(Debug)]
pub struct ResponseStore {
    responses: RwLock<LruCache<ResponseKey, CachedResponse>>,
}

impl ResponseStore {
    pub fn new(limit: usize) -> Self {
        let capacity = NonZeroUsize::new(limit.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            responses: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        rw_write(&self.responses, "response_store").get(key).cloned()
    }

    pub fn put(&self, key: ResponseKey, response: CachedResponse) {
        rw_write(&self.responses, "response_store").put(key, response);
    }

    /// Drops every cached variant of a path, regardless of query string.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let mut responses = rw_write(&self.responses, "response_store");
        let stale: Vec<ResponseKey> = responses
            .iter()
            .filter(|(key, _)| key.path == path)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            responses.pop(key);
        }
        stale.len()
    }

    pub fn clear(&self) -> usize {
        let mut responses = rw_write(&self.responses, "response_store");
        let dropped = responses.len();
        responses.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        rw_read(&self.responses, "response_store").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(items: &[&str]) -> HashSet<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn fresh_entries_are_returned_until_their_ttl_elapses() {
        let store = ObjectStore::new();
        let key = CacheKey::list("cases");
        store.put(
            key.clone(),
            Some(json!([{"slug": "maitreya"}])),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:cases"]),
        );
        assert!(matches!(store.get(&key), Lookup::Fresh(Some(_))));

        store.put(key.clone(), Some(json!([])), Duration::ZERO, tags(&["cms:all"]));
        assert_eq!(store.get(&key), Lookup::Stale);
    }

    #[test]
    fn negative_entries_are_fresh_hits() {
        let store = ObjectStore::new();
        let key = CacheKey::item("cases", "missing");
        store.put(key.clone(), None, Duration::from_secs(60), tags(&["cms:all"]));
        assert_eq!(store.get(&key), Lookup::Fresh(None));
    }

    #[test]
    fn stale_reads_reclaim_the_entry() {
        let store = ObjectStore::new();
        let key = CacheKey::item("cases", "gone");
        store.put(key.clone(), None, Duration::ZERO, tags(&["cms:all"]));
        assert_eq!(store.get(&key), Lookup::Stale);
        assert!(store.is_empty());
        assert_eq!(store.get(&key), Lookup::Miss);
    }

    #[test]
    fn expired_entries_are_swept_as_new_ones_arrive() {
        let store = ObjectStore::new();
        // Simulates a crawler walking nonexistent slugs: every request
        // writes an expired-on-arrival negative entry that is never read.
        for i in 0..200 {
            store.put(
                CacheKey::item("cases", format!("missing-{i}")),
                None,
                Duration::ZERO,
                tags(&["cms:all", "cms:cases"]),
            );
        }
        assert!(store.len() <= SWEEP_INTERVAL);
    }

    #[test]
    fn tag_invalidation_only_touches_tagged_entries() {
        let store = ObjectStore::new();
        store.put(
            CacheKey::list("cases"),
            Some(json!([])),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:cases"]),
        );
        store.put(
            CacheKey::list("blog"),
            Some(json!([])),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:blog"]),
        );

        assert_eq!(store.invalidate_tag("cms:cases"), 1);
        assert_eq!(store.get(&CacheKey::list("cases")), Lookup::Miss);
        assert!(matches!(store.get(&CacheKey::list("blog")), Lookup::Fresh(_)));
    }

    #[test]
    fn global_tag_flushes_everything() {
        let store = ObjectStore::new();
        store.put(
            CacheKey::list("cases"),
            Some(json!([])),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:cases"]),
        );
        store.put(
            CacheKey::item("blog", "hello"),
            Some(json!({})),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:blog"]),
        );
        assert_eq!(store.invalidate_tag("cms:all"), 2);
        assert!(store.is_empty());
    }

    fn response(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    #[test]
    fn path_invalidation_drops_all_query_variants() {
        let store = ResponseStore::new(10);
        store.put(ResponseKey::new("/work", None), response("[]"));
        store.put(ResponseKey::new("/work", Some("draft=1")), response("[]"));
        store.put(ResponseKey::new("/journal", None), response("[]"));

        assert_eq!(store.invalidate_path("/work"), 2);
        assert!(store.get(&ResponseKey::new("/work", None)).is_none());
        assert!(store.get(&ResponseKey::new("/journal", None)).is_some());
    }

    #[test]
    fn response_store_evicts_least_recently_used() {
        let store = ResponseStore::new(2);
        store.put(ResponseKey::new("/a", None), response("a"));
        store.put(ResponseKey::new("/b", None), response("b"));
        // Touch /a so /b becomes the eviction candidate.
        assert!(store.get(&ResponseKey::new("/a", None)).is_some());
        store.put(ResponseKey::new("/c", None), response("c"));

        assert!(store.get(&ResponseKey::new("/a", None)).is_some());
        assert!(store.get(&ResponseKey::new("/b", None)).is_none());
        assert!(store.get(&ResponseKey::new("/c", None)).is_some());
    }
}
