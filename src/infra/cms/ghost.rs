//! Ghost adapter, against the Content API. Ghost webhooks carry no
//! signature, so deliveries are accepted unverified.

use async_trait::async_trait;
use serde_json::Value;

use crate::application::providers::{
    ContentProvider, ProviderError, Record, WebhookTarget, WebhookVerification,
};
use crate::config::GhostSettings;

use super::str_at;

pub struct GhostProvider {
    settings: GhostSettings,
    client: reqwest::Client,
}

impl GhostProvider {
    pub fn new(settings: GhostSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((
            self.settings.url.as_deref()?,
            self.settings.content_api_key.as_deref()?,
        ))
    }

    async fn fetch(&self, resource: &str) -> Result<Value, ProviderError> {
        let (base, key) = self
            .credentials()
            .ok_or(ProviderError::Unavailable("ghost"))?;

        let response = self
            .client
            .get(format!(
                "{}/ghost/api/content/{resource}/",
                base.trim_end_matches('/')
            ))
            .query(&[("key", key), ("limit", "all")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Upstream {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ContentProvider for GhostProvider {
    fn name(&self) -> &'static str {
        "ghost"
    }

    fn is_available(&self) -> bool {
        self.credentials().is_some()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError> {
        // Ghost 404s resource types it does not know; that is an empty
        // collection, not an upstream failure.
        let body = match self.fetch(collection).await {
            Ok(body) => body,
            Err(err) if is_not_found(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        body.get(collection)
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| ProviderError::Decode(format!("missing `{collection}` array")))
    }

    async fn get(&self, collection: &str, slug: &str) -> Result<Option<Record>, ProviderError> {
        let body = match self.fetch(&format!("{collection}/slug/{slug}")).await {
            Ok(body) => body,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(body
            .get(collection)
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .cloned())
    }

    fn webhook_target(&self, payload: &Value) -> WebhookTarget {
        for collection in ["post", "page"] {
            if let Some(slug) = str_at(payload, &[collection, "current", "slug"]) {
                return WebhookTarget::item(format!("{collection}s"), slug);
            }
            if payload.get(collection).is_some() {
                return WebhookTarget::collection(format!("{collection}s"));
            }
        }
        WebhookTarget::default()
    }

    fn webhook_verification(&self) -> WebhookVerification {
        WebhookVerification::Unverified
    }
}

fn is_not_found(err: &ProviderError) -> bool {
    matches!(err, ProviderError::Upstream { status: 404 })
}
