//! Contentful adapter, against the Content Delivery API.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::application::providers::{
    ContentProvider, ProviderError, Record, WebhookTarget, WebhookVerification,
};
use crate::config::ContentfulSettings;

use super::str_at;

const CDN_BASE: &str = "https://cdn.contentful.com";

pub struct ContentfulProvider {
    settings: ContentfulSettings,
    client: reqwest::Client,
}

impl ContentfulProvider {
    pub fn new(settings: ContentfulSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((
            self.settings.space_id.as_deref()?,
            self.settings.access_token.as_deref()?,
        ))
    }

    async fn entries(
        &self,
        collection: &str,
        slug: Option<&str>,
    ) -> Result<Vec<Record>, ProviderError> {
        let (space_id, token) = self
            .credentials()
            .ok_or(ProviderError::Unavailable("contentful"))?;

        let mut request = self
            .client
            .get(format!(
                "{CDN_BASE}/spaces/{space_id}/environments/master/entries"
            ))
            .bearer_auth(token)
            .query(&[("content_type", collection)]);
        if let Some(slug) = slug {
            request = request.query(&[("fields.slug", slug)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Upstream {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Decode("missing `items` array".into()))?;
        Ok(items.iter().map(flatten_entry).collect())
    }
}

#[async_trait]
impl ContentProvider for ContentfulProvider {
    fn name(&self) -> &'static str {
        "contentful"
    }

    fn is_available(&self) -> bool {
        self.credentials().is_some()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError> {
        self.entries(collection, None).await
    }

    async fn get(&self, collection: &str, slug: &str) -> Result<Option<Record>, ProviderError> {
        Ok(self.entries(collection, Some(slug)).await?.into_iter().next())
    }

    fn webhook_target(&self, payload: &Value) -> WebhookTarget {
        let collection = str_at(payload, &["sys", "contentType", "sys", "id"]);
        let slug = payload
            .get("fields")
            .and_then(|fields| fields.get("slug"))
            .and_then(localized_str);
        WebhookTarget {
            collection: collection.map(str::to_owned),
            slug: slug.map(str::to_owned),
        }
    }

    fn webhook_verification(&self) -> WebhookVerification {
        WebhookVerification::Basic {
            fallback_header: "x-contentful-webhook-name",
            secret: self.settings.webhook_secret.clone(),
        }
    }
}

/// Webhook field values are keyed by locale; take whichever comes first.
fn localized_str(field: &Value) -> Option<&str> {
    match field {
        Value::String(s) => Some(s),
        Value::Object(locales) => locales.values().find_map(Value::as_str),
        _ => None,
    }
}

/// Merges an entry's fields with its system id into one flat record.
fn flatten_entry(entry: &Value) -> Record {
    let mut record = entry
        .get("fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);
    if let Some(id) = str_at(entry, &["sys", "id"]) {
        record.insert("id".to_owned(), json!(id));
    }
    Value::Object(record)
}
