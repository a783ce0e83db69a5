//! Cached content reads.
//!
//! [`ContentService`] is the single read path for CMS content: look up the
//! object store, and on a miss fetch through the collection's adapter under a
//! per-key flight lock so concurrent misses collapse into one upstream fetch.
//! Failures are swallowed into a cached `None` so pages render their empty
//! state instead of erroring, and the provider is not hammered until the
//! entry's TTL elapses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheConfig, CacheKey, Lookup, ObjectStore};
use crate::domain::{ContentRegistry, GLOBAL_TAG};

use super::providers::ContentProvider;
use super::registry::AdapterRegistry;

pub struct ContentService {
    adapters: Arc<AdapterRegistry>,
    content: Arc<ContentRegistry>,
    store: Arc<ObjectStore>,
    config: Arc<CacheConfig>,
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl ContentService {
    pub fn new(
        adapters: Arc<AdapterRegistry>,
        content: Arc<ContentRegistry>,
        store: Arc<ObjectStore>,
        config: Arc<CacheConfig>,
    ) -> Self {
        Self {
            adapters,
            content,
            store,
            config,
            in_flight: DashMap::new(),
        }
    }

    /// Cached read with the collection's registered TTL.
    pub async fn get_cached(&self, collection: &str, slug: Option<&str>) -> Option<Value> {
        let ttl = self.content.ttl_for(collection);
        self.get_cached_with_ttl(collection, slug, ttl).await
    }

    /// Cached read with an explicit TTL. `slug` of `None` reads the whole
    /// collection as a JSON array.
    pub async fn get_cached_with_ttl(
        &self,
        collection: &str,
        slug: Option<&str>,
        ttl: Duration,
    ) -> Option<Value> {
        let key = match slug {
            Some(slug) => CacheKey::item(collection, slug),
            None => CacheKey::list(collection),
        };

        if let Lookup::Fresh(value) = self.store.get(&key) {
            metrics::counter!("brezza_content_cache_hits_total").increment(1);
            debug!(key = %key, "content cache hit");
            return value;
        }

        let gate = self
            .in_flight
            .entry(key.clone())
            .or_default()
            .value()
            .clone();
        let value = {
            let _guard = gate.lock().await;
            // Another flight may have filled the entry while we waited.
            if let Lookup::Fresh(value) = self.store.get(&key) {
                metrics::counter!("brezza_content_cache_hits_total").increment(1);
                value
            } else {
                metrics::counter!("brezza_content_cache_misses_total").increment(1);
                self.fetch_and_store(collection, slug, &key, ttl).await
            }
        };
        self.in_flight
            .remove_if(&key, |_, gate| Arc::strong_count(gate) <= 1);
        value
    }

    async fn fetch_and_store(
        &self,
        collection: &str,
        slug: Option<&str>,
        key: &CacheKey,
        ttl: Duration,
    ) -> Option<Value> {
        let Some(adapter) = self.adapters.adapter_for(collection) else {
            warn!(collection, "no adapter for collection, caching empty result");
            self.store_result(key, collection, None, ttl);
            return None;
        };

        let started = Instant::now();
        let fetched = tokio::time::timeout(
            self.config.fetch_timeout,
            self.fetch(adapter.as_ref(), collection, slug),
        )
        .await;
        metrics::histogram!("brezza_provider_fetch_seconds")
            .record(started.elapsed().as_secs_f64());

        let value = match fetched {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                warn!(key = %key, provider = adapter.name(), error = %err, "provider fetch failed");
                metrics::counter!("brezza_provider_fetch_errors_total").increment(1);
                None
            }
            Err(_) => {
                warn!(key = %key, provider = adapter.name(), "provider fetch timed out");
                metrics::counter!("brezza_provider_fetch_errors_total").increment(1);
                None
            }
        };
        self.store_result(key, collection, value.clone(), ttl);
        value
    }

    async fn fetch(
        &self,
        adapter: &dyn ContentProvider,
        collection: &str,
        slug: Option<&str>,
    ) -> Result<Option<Value>, super::providers::ProviderError> {
        match slug {
            Some(slug) => adapter.get(collection, slug).await,
            None => adapter.list(collection).await.map(|records| {
                Some(Value::Array(records))
            }),
        }
    }

    fn store_result(&self, key: &CacheKey, collection: &str, value: Option<Value>, ttl: Duration) {
        let tags: HashSet<String> =
            [GLOBAL_TAG.to_owned(), crate::domain::tag_for(collection)].into();
        self.store.put(key.clone(), value, ttl, tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::providers::{
        ProviderError, Record, WebhookTarget, WebhookVerification,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        fetches: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "notion"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ProviderError::Upstream { status: 500 });
            }
            Ok(vec![json!({"collection": collection})])
        }

        async fn get(
            &self,
            _collection: &str,
            slug: &str,
        ) -> Result<Option<Record>, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Upstream { status: 500 });
            }
            Ok(Some(json!({"slug": slug})))
        }

        fn webhook_target(&self, _payload: &serde_json::Value) -> WebhookTarget {
            WebhookTarget::default()
        }

        fn webhook_verification(&self) -> WebhookVerification {
            WebhookVerification::Unverified
        }
    }

    struct Harness {
        provider: Arc<CountingProvider>,
        store: Arc<ObjectStore>,
        service: ContentService,
    }

    fn harness(provider: CountingProvider) -> Harness {
        let provider = Arc::new(provider);
        let content = Arc::new(ContentRegistry::portfolio());
        let store = Arc::new(ObjectStore::new());
        let adapters = Arc::new(AdapterRegistry::new(
            vec![provider.clone() as Arc<dyn ContentProvider>],
            content.clone(),
        ));
        let service = ContentService::new(
            adapters,
            content,
            store.clone(),
            Arc::new(CacheConfig::default()),
        );
        Harness {
            provider,
            store,
            service,
        }
    }

    #[tokio::test]
    async fn repeated_reads_within_ttl_fetch_once() {
        let h = harness(CountingProvider::new());
        let first = h.service.get_cached("cases", None).await;
        let second = h.service.get_cached("cases", None).await;
        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(h.provider.count(), 1);
    }

    #[tokio::test]
    async fn tag_invalidation_forces_exactly_one_refetch() {
        let h = harness(CountingProvider::new());
        h.service.get_cached("cases", None).await;
        h.store.invalidate_tag("cms:cases");
        h.service.get_cached("cases", None).await;
        h.service.get_cached("cases", None).await;
        assert_eq!(h.provider.count(), 2);
    }

    #[tokio::test]
    async fn global_tag_invalidates_every_collection() {
        let h = harness(CountingProvider::new());
        h.service.get_cached("cases", None).await;
        h.service.get_cached("blog", None).await;
        h.store.invalidate_tag(GLOBAL_TAG);
        h.service.get_cached("cases", None).await;
        h.service.get_cached("blog", None).await;
        assert_eq!(h.provider.count(), 4);
    }

    #[tokio::test]
    async fn provider_failure_is_cached_as_negative() {
        let mut provider = CountingProvider::new();
        provider.fail = true;
        let h = harness(provider);
        assert!(h.service.get_cached("cases", None).await.is_none());
        assert!(h.service.get_cached("cases", None).await.is_none());
        // The failure was cached, the provider was not retried.
        assert_eq!(h.provider.count(), 1);
    }

    #[tokio::test]
    async fn missing_adapter_yields_none_without_panicking() {
        let content = Arc::new(ContentRegistry::portfolio());
        let store = Arc::new(ObjectStore::new());
        let adapters = Arc::new(AdapterRegistry::new(Vec::new(), content.clone()));
        let service =
            ContentService::new(adapters, content, store, Arc::new(CacheConfig::default()));
        assert!(service.get_cached("cases", None).await.is_none());
        assert!(service.get_cached("cases", Some("maitreya")).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_misses_collapse_into_one_fetch() {
        let mut provider = CountingProvider::new();
        provider.delay = Duration::from_millis(50);
        let h = harness(provider);
        let service = Arc::new(h.service);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service.get_cached("cases", None).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }
        assert_eq!(h.provider.count(), 1);
    }

    #[tokio::test]
    async fn list_and_item_reads_use_distinct_keys() {
        let h = harness(CountingProvider::new());
        h.service.get_cached("cases", None).await;
        let item = h.service.get_cached("cases", Some("maitreya")).await;
        assert_eq!(item, Some(json!({"slug": "maitreya"})));
        assert_eq!(h.provider.count(), 2);
    }
}
