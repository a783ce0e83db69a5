//! Invalidation and post-invalidation warming.
//!
//! [`RevalidationService`] is the one place cache entries are thrown away:
//! by tag, by collection, by path, or globally. It also turns normalized
//! webhook targets into that sequence of invalidations plus an optional
//! warming pass, collecting a human-readable action log as it goes.

use std::sync::Arc;

use tracing::info;

use crate::cache::{ObjectStore, ResponseStore};
use crate::domain::{ContentRegistry, GLOBAL_TAG, tag_for};
use crate::infra::warmer::{CacheWarmer, WarmReport};

use super::providers::{ContentProvider, WebhookTarget};

/// What a webhook delivery caused, echoed back to the sender.
#[derive(Debug, Default)]
pub struct WebhookOutcome {
    pub actions: Vec<String>,
    pub warmed_paths: Vec<String>,
    pub report: Option<WarmReport>,
}

pub struct RevalidationService {
    store: Arc<ObjectStore>,
    responses: Arc<ResponseStore>,
    warmer: Arc<CacheWarmer>,
    content: Arc<ContentRegistry>,
}

impl RevalidationService {
    pub fn new(
        store: Arc<ObjectStore>,
        responses: Arc<ResponseStore>,
        warmer: Arc<CacheWarmer>,
        content: Arc<ContentRegistry>,
    ) -> Self {
        Self {
            store,
            responses,
            warmer,
            content,
        }
    }

    /// Invalidates one tag in the object store. The global tag also clears
    /// the response cache, since every page may embed any content.
    pub fn revalidate_tag(&self, tag: &str) -> usize {
        let dropped = self.store.invalidate_tag(tag);
        if tag == GLOBAL_TAG {
            self.responses.clear();
        }
        info!(tag, dropped, "revalidated tag");
        dropped
    }

    /// Invalidates a collection's tag plus the cached responses of its
    /// registered routes. Returns the tag that was used.
    pub fn revalidate_collection(&self, collection: &str) -> (String, usize) {
        let tag = tag_for(collection);
        let mut dropped = self.store.invalidate_tag(&tag);
        dropped += self.responses.invalidate_path(&self.content.list_path(collection));
        info!(collection, tag, dropped, "revalidated collection");
        (tag, dropped)
    }

    /// Invalidates one path's cached responses, and the object entry behind
    /// it when the path resolves to a registered detail route.
    pub fn revalidate_path(&self, path: &str) -> usize {
        let mut dropped = self.responses.invalidate_path(path);
        if let Some(entry) = self.content.by_path(path) {
            if entry.has_slug() {
                if let Some((prefix, _)) = entry.path.split_once(crate::domain::content::SLUG_PLACEHOLDER) {
                    if let Some(slug) = path.strip_prefix(prefix) {
                        let key =
                            crate::cache::CacheKey::item(entry.collection(), slug);
                        if self.store.invalidate_key(&key) {
                            dropped += 1;
                        }
                    }
                }
            }
        }
        info!(path, dropped, "revalidated path");
        dropped
    }

    /// Global flush: every tagged object and every cached response.
    pub fn revalidate_all(&self) -> usize {
        self.revalidate_tag(GLOBAL_TAG)
    }

    pub async fn warm(&self, paths: &[String]) -> WarmReport {
        self.warmer.warm(paths).await
    }

    /// Applies a webhook target: always the global tag, then the collection
    /// tag, then the item path, then warming of the affected pages.
    pub async fn handle_webhook(
        &self,
        adapter: &dyn ContentProvider,
        target: WebhookTarget,
    ) -> WebhookOutcome {
        let mut outcome = WebhookOutcome::default();

        self.revalidate_tag(GLOBAL_TAG);
        outcome
            .actions
            .push(format!("Revalidated global tag: {GLOBAL_TAG}"));

        if let Some(collection) = &target.collection {
            let tag = adapter.tag_for(collection);
            self.revalidate_tag(&tag);
            outcome
                .actions
                .push(format!("Revalidated collection: {collection} (tag: {tag})"));

            if let Some(slug) = &target.slug {
                let path = self.content.item_path(collection, slug);
                self.revalidate_path(&path);
                outcome.actions.push(format!("Revalidated path: {path}"));
                outcome.warmed_paths.push(path);
            }

            outcome.warmed_paths.push(self.content.list_path(collection));
            outcome.warmed_paths.push("/".to_owned());
        }

        if !outcome.warmed_paths.is_empty() {
            let report = self.warm(&outcome.warmed_paths).await;
            outcome
                .actions
                .push(format!("Warmed {} paths", outcome.warmed_paths.len()));
            outcome.report = Some(report);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::providers::{
        ProviderError, Record, WebhookVerification,
    };
    use crate::cache::{CacheKey, CachedResponse, ResponseKey};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashSet;
    use std::time::Duration;

    struct NamedProvider;

    #[async_trait]
    impl ContentProvider for NamedProvider {
        fn name(&self) -> &'static str {
            "notion"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn list(&self, _collection: &str) -> Result<Vec<Record>, ProviderError> {
            Ok(Vec::new())
        }

        async fn get(
            &self,
            _collection: &str,
            _slug: &str,
        ) -> Result<Option<Record>, ProviderError> {
            Ok(None)
        }

        fn webhook_target(&self, _payload: &Value) -> WebhookTarget {
            WebhookTarget::default()
        }

        fn webhook_verification(&self) -> WebhookVerification {
            WebhookVerification::Unverified
        }
    }

    fn service() -> (Arc<ObjectStore>, Arc<ResponseStore>, RevalidationService) {
        let store = Arc::new(ObjectStore::new());
        let responses = Arc::new(ResponseStore::new(16));
        // Port 9 is discard; connections are refused, which the warmer
        // tolerates by design of the report.
        let warmer = Arc::new(CacheWarmer::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9".parse().unwrap(),
            Duration::from_millis(200),
            0,
        ));
        let service = RevalidationService::new(
            store.clone(),
            responses.clone(),
            warmer,
            Arc::new(ContentRegistry::portfolio()),
        );
        (store, responses, service)
    }

    fn tags(items: &[&str]) -> HashSet<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn webhook_with_item_produces_full_action_log() {
        let (_, _, service) = service();
        let outcome = service
            .handle_webhook(&NamedProvider, WebhookTarget::item("cases", "maitreya"))
            .await;

        assert_eq!(
            outcome.actions,
            vec![
                "Revalidated global tag: cms:all",
                "Revalidated collection: cases (tag: cms:cases)",
                "Revalidated path: /work/maitreya",
                "Warmed 3 paths",
            ]
        );
        assert_eq!(outcome.warmed_paths, vec!["/work/maitreya", "/work", "/"]);
        // The warmer target refuses connections, so all paths settle failed.
        let report = outcome.report.unwrap();
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.warmed.len() + report.failed.len(), 3);
    }

    #[tokio::test]
    async fn webhook_without_collection_only_flushes_globally() {
        let (store, _, service) = service();
        store.put(
            CacheKey::list("cases"),
            Some(json!([])),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:cases"]),
        );

        let outcome = service
            .handle_webhook(&NamedProvider, WebhookTarget::default())
            .await;

        assert_eq!(outcome.actions, vec!["Revalidated global tag: cms:all"]);
        assert!(outcome.warmed_paths.is_empty());
        assert!(outcome.report.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn collection_revalidation_reports_its_tag() {
        let (store, responses, service) = service();
        store.put(
            CacheKey::list("blog"),
            Some(json!([])),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:blog"]),
        );
        responses.put(
            ResponseKey::new("/journal", None),
            CachedResponse {
                status: 200,
                headers: Vec::new(),
                body: bytes::Bytes::from_static(b"[]"),
            },
        );

        let (tag, dropped) = service.revalidate_collection("blog");
        assert_eq!(tag, "cms:blog");
        assert_eq!(dropped, 2);
    }

    #[tokio::test]
    async fn path_revalidation_also_drops_the_item_object() {
        let (store, responses, service) = service();
        store.put(
            CacheKey::item("cases", "maitreya"),
            Some(json!({})),
            Duration::from_secs(60),
            tags(&["cms:all", "cms:cases"]),
        );
        responses.put(
            ResponseKey::new("/work/maitreya", None),
            CachedResponse {
                status: 200,
                headers: Vec::new(),
                body: bytes::Bytes::from_static(b"{}"),
            },
        );

        assert_eq!(service.revalidate_path("/work/maitreya"), 2);
        assert!(store.is_empty());
        assert!(responses.is_empty());
    }
}
