//! The provider seam.
//!
//! Every CMS backend implements [`ContentProvider`]: list a collection, fetch
//! one item by slug, translate its webhook payloads into a normalized
//! [`WebhookTarget`], and describe how its webhooks are authenticated. The
//! rest of the system only ever sees this trait.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Decoded content objects are passed around as plain JSON values; the cache
/// and the HTTP surface never interpret their shape.
pub type Record = Value;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The adapter is missing credentials and cannot serve requests.
    #[error("provider `{0}` is not configured")]
    Unavailable(&'static str),
    #[error("request to provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}")]
    Upstream { status: u16 },
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

/// What a webhook payload was about, as much of it as the payload reveals.
/// Both fields absent is valid and still triggers a global invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookTarget {
    pub collection: Option<String>,
    pub slug: Option<String>,
}

impl WebhookTarget {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            slug: None,
        }
    }

    pub fn item(collection: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            slug: Some(slug.into()),
        }
    }
}

/// How a provider authenticates its webhook deliveries.
#[derive(Debug, Clone)]
pub enum WebhookVerification {
    /// Hex-encoded HMAC-SHA256 of the raw body in the named header.
    HmacSha256 {
        header: &'static str,
        secret: Option<String>,
    },
    /// HTTP Basic credentials, with presence of the named header accepted as
    /// a weak fallback when no Authorization header is sent.
    Basic {
        fallback_header: &'static str,
        secret: Option<String>,
    },
    /// The shared secret is sent verbatim in the named header.
    HeaderToken {
        header: &'static str,
        secret: Option<String>,
    },
    /// The provider signs nothing; deliveries are accepted as-is.
    Unverified,
}

#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Stable lowercase name, also the webhook route segment.
    fn name(&self) -> &'static str;

    /// Whether the adapter has the credentials it needs. Pure: it reflects
    /// startup configuration and never probes the network.
    fn is_available(&self) -> bool;

    /// All items of a collection. An unknown collection is an empty list,
    /// not an error.
    async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError>;

    /// One item by slug; `Ok(None)` when the slug does not exist.
    async fn get(&self, collection: &str, slug: &str) -> Result<Option<Record>, ProviderError>;

    /// Cache tag for a collection served by this provider.
    fn tag_for(&self, collection: &str) -> String {
        crate::domain::tag_for(collection)
    }

    /// Extracts collection and slug from a webhook payload. Must tolerate any
    /// JSON shape; unknown shapes yield an empty target.
    fn webhook_target(&self, payload: &Value) -> WebhookTarget;

    /// The verification scheme for this provider's webhooks.
    fn webhook_verification(&self) -> WebhookVerification;
}
