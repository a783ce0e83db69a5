//! Content collections and the cache-tag naming scheme.
//!
//! Every cached object belongs to a collection, every collection maps to a
//! single tag of the form `cms:<collection>`, and everything additionally
//! carries the global [`GLOBAL_TAG`] so one invalidation can flush the whole
//! content cache.

use std::time::Duration;

use thiserror::Error;

/// Tag attached to every cached content object.
pub const GLOBAL_TAG: &str = "cms:all";

/// Prefix shared by all collection tags.
pub const TAG_PREFIX: &str = "cms:";

/// Placeholder used in route templates for the item slug segment.
pub const SLUG_PLACEHOLDER: &str = "[slug]";

/// Default time-to-live for cached content: 30 minutes.
pub const DEFAULT_REVALIDATE: Duration = Duration::from_secs(1800);

/// Canonical tag for a collection.
pub fn tag_for(collection: &str) -> String {
    format!("{TAG_PREFIX}{collection}")
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate content key `{0}`")]
    DuplicateKey(String),
    #[error("content key `{key}` has tag `{tag}` without the `{TAG_PREFIX}` prefix")]
    BadTag { key: String, tag: String },
    #[error("content key `{key}` has an empty route path")]
    EmptyPath { key: String },
}

/// One entry of the content registry: how a collection is keyed, routed,
/// tagged, sourced, and how long its cache entries live.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Registry key, e.g. `cases` or `case`. List and detail views of the
    /// same collection are separate entries sharing a tag.
    pub key: String,
    /// Route template. Detail entries carry a `[slug]` placeholder.
    pub path: String,
    /// Cache tag, always `cms:<collection>`.
    pub tag: String,
    /// Declared provider for this collection.
    pub provider: String,
    /// Time-to-live for cached objects of this collection.
    pub revalidate: Duration,
}

impl ContentConfig {
    /// Collection name, derived from the tag.
    pub fn collection(&self) -> &str {
        self.tag.strip_prefix(TAG_PREFIX).unwrap_or(&self.tag)
    }

    pub fn has_slug(&self) -> bool {
        self.path.contains(SLUG_PLACEHOLDER)
    }

    /// Substitutes the slug into the route template.
    pub fn resolve_path(&self, slug: &str) -> String {
        self.path.replace(SLUG_PLACEHOLDER, slug)
    }
}

/// Immutable map of content collections to routes, tags and providers.
#[derive(Debug, Clone)]
pub struct ContentRegistry {
    entries: Vec<ContentConfig>,
}

impl ContentRegistry {
    pub fn new(entries: Vec<ContentConfig>) -> Result<Self, RegistryError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.key.clone()) {
                return Err(RegistryError::DuplicateKey(entry.key.clone()));
            }
            if !entry.tag.starts_with(TAG_PREFIX) {
                return Err(RegistryError::BadTag {
                    key: entry.key.clone(),
                    tag: entry.tag.clone(),
                });
            }
            if entry.path.is_empty() {
                return Err(RegistryError::EmptyPath {
                    key: entry.key.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The built-in portfolio registry: case studies under `/work`, journal
    /// posts under `/journal`, all sourced from Notion.
    pub fn portfolio() -> Self {
        let entry = |key: &str, path: &str, tag: &str| ContentConfig {
            key: key.to_owned(),
            path: path.to_owned(),
            tag: tag.to_owned(),
            provider: "notion".to_owned(),
            revalidate: DEFAULT_REVALIDATE,
        };
        // Validated by construction.
        Self {
            entries: vec![
                entry("cases", "/work", "cms:cases"),
                entry("case", "/work/[slug]", "cms:cases"),
                entry("blog", "/journal", "cms:blog"),
                entry("post", "/journal/[slug]", "cms:blog"),
            ],
        }
    }

    pub fn entries(&self) -> &[ContentConfig] {
        &self.entries
    }

    pub fn by_key(&self, key: &str) -> Option<&ContentConfig> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Resolves a concrete request path back to its registry entry. Detail
    /// templates match any single trailing segment in the slug position.
    pub fn by_path(&self, path: &str) -> Option<&ContentConfig> {
        self.entries.iter().find(|e| {
            if e.has_slug() {
                match e.path.split_once(SLUG_PLACEHOLDER) {
                    Some((prefix, "")) => path
                        .strip_prefix(prefix)
                        .is_some_and(|slug| !slug.is_empty() && !slug.contains('/')),
                    _ => false,
                }
            } else {
                e.path == path
            }
        })
    }

    /// Entries whose tag names the given collection.
    fn for_collection<'a>(
        &'a self,
        collection: &'a str,
    ) -> impl Iterator<Item = &'a ContentConfig> {
        self.entries
            .iter()
            .filter(move |e| e.collection() == collection)
    }

    /// Path to one item of a collection, from its detail entry's template.
    /// Falls back to `/<collection>/<slug>` for unregistered collections.
    pub fn item_path(&self, collection: &str, slug: &str) -> String {
        self.for_collection(collection)
            .find(|e| e.has_slug())
            .map(|e| e.resolve_path(slug))
            .unwrap_or_else(|| format!("/{collection}/{slug}"))
    }

    /// Path to the list view of a collection, with a `/<collection>` fallback.
    pub fn list_path(&self, collection: &str) -> String {
        self.for_collection(collection)
            .find(|e| !e.has_slug())
            .map(|e| e.path.clone())
            .unwrap_or_else(|| format!("/{collection}"))
    }

    /// TTL for a collection's cache entries, defaulting for unknown ones.
    pub fn ttl_for(&self, collection: &str) -> Duration {
        self.for_collection(collection)
            .map(|e| e.revalidate)
            .next()
            .unwrap_or(DEFAULT_REVALIDATE)
    }

    /// Declared provider for a collection, if any entry names it. The
    /// borrow is tied to both inputs because the filter holds `collection`.
    pub fn provider_for<'a>(&'a self, collection: &'a str) -> Option<&'a str> {
        self.for_collection(collection)
            .map(|e| e.provider.as_str())
            .next()
    }

    /// Every distinct collection named by the registry.
    pub fn collections(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            let collection = entry.collection();
            if !seen.contains(&collection) {
                seen.push(collection);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_carry_the_cms_prefix() {
        assert_eq!(tag_for("cases"), "cms:cases");
        assert_eq!(tag_for("blog"), "cms:blog");
    }

    #[test]
    fn portfolio_registry_routes() {
        let registry = ContentRegistry::portfolio();
        assert_eq!(registry.item_path("cases", "maitreya"), "/work/maitreya");
        assert_eq!(registry.list_path("cases"), "/work");
        assert_eq!(registry.item_path("blog", "hello"), "/journal/hello");
        assert_eq!(registry.list_path("blog"), "/journal");
    }

    #[test]
    fn unknown_collections_get_fallback_paths() {
        let registry = ContentRegistry::portfolio();
        assert_eq!(registry.item_path("pages", "about"), "/pages/about");
        assert_eq!(registry.list_path("pages"), "/pages");
        assert_eq!(registry.ttl_for("pages"), DEFAULT_REVALIDATE);
    }

    #[test]
    fn declared_providers_resolve_for_known_collections() {
        let registry = ContentRegistry::portfolio();
        assert_eq!(registry.provider_for("cases"), Some("notion"));
        assert_eq!(registry.provider_for("blog"), Some("notion"));
        assert!(registry.provider_for("pages").is_none());
    }

    #[test]
    fn collection_derives_from_tag_not_key() {
        let registry = ContentRegistry::portfolio();
        let detail = registry.by_key("case").unwrap();
        assert_eq!(detail.collection(), "cases");
        assert_eq!(detail.resolve_path("atlas"), "/work/atlas");
    }

    #[test]
    fn by_path_matches_templates() {
        let registry = ContentRegistry::portfolio();
        assert_eq!(registry.by_path("/work").unwrap().key, "cases");
        assert_eq!(registry.by_path("/work/atlas").unwrap().key, "case");
        assert!(registry.by_path("/work/a/b").is_none());
        assert!(registry.by_path("/about").is_none());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let entry = ContentConfig {
            key: "cases".into(),
            path: "/work".into(),
            tag: "cms:cases".into(),
            provider: "notion".into(),
            revalidate: DEFAULT_REVALIDATE,
        };
        let err = ContentRegistry::new(vec![entry.clone(), entry]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKey(_)));
    }

    #[test]
    fn tags_without_prefix_are_rejected() {
        let entry = ContentConfig {
            key: "cases".into(),
            path: "/work".into(),
            tag: "cases".into(),
            provider: "notion".into(),
            revalidate: DEFAULT_REVALIDATE,
        };
        let err = ContentRegistry::new(vec![entry]).unwrap_err();
        assert!(matches!(err, RegistryError::BadTag { .. }));
    }
}
