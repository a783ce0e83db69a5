//! Strapi adapter, against the REST content API.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::application::providers::{
    ContentProvider, ProviderError, Record, WebhookTarget, WebhookVerification,
};
use crate::config::StrapiSettings;

use super::str_at;

pub struct StrapiProvider {
    settings: StrapiSettings,
    client: reqwest::Client,
}

impl StrapiProvider {
    pub fn new(settings: StrapiSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((
            self.settings.url.as_deref()?,
            self.settings.token.as_deref()?,
        ))
    }

    async fn fetch(
        &self,
        collection: &str,
        slug: Option<&str>,
    ) -> Result<Vec<Record>, ProviderError> {
        let (base, token) = self
            .credentials()
            .ok_or(ProviderError::Unavailable("strapi"))?;

        let mut request = self
            .client
            .get(format!("{}/api/{collection}", base.trim_end_matches('/')))
            .bearer_auth(token);
        if let Some(slug) = slug {
            request = request.query(&[("filters[slug][$eq]", slug)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Upstream {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Decode("missing `data` array".into()))?;
        Ok(data.iter().map(flatten_entry).collect())
    }
}

#[async_trait]
impl ContentProvider for StrapiProvider {
    fn name(&self) -> &'static str {
        "strapi"
    }

    fn is_available(&self) -> bool {
        self.credentials().is_some()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError> {
        self.fetch(collection, None).await
    }

    async fn get(&self, collection: &str, slug: &str) -> Result<Option<Record>, ProviderError> {
        Ok(self.fetch(collection, Some(slug)).await?.into_iter().next())
    }

    fn webhook_target(&self, payload: &Value) -> WebhookTarget {
        let slug = str_at(payload, &["entry", "slug"])
            .or_else(|| str_at(payload, &["entry", "Slug"]));
        WebhookTarget {
            collection: str_at(payload, &["model"]).map(str::to_owned),
            slug: slug.map(str::to_owned),
        }
    }

    fn webhook_verification(&self) -> WebhookVerification {
        WebhookVerification::HeaderToken {
            header: "authorization",
            secret: self.settings.webhook_secret.clone(),
        }
    }
}

/// Strapi nests the document under `attributes`; merge them with the id.
fn flatten_entry(entry: &Value) -> Record {
    let mut record = entry
        .get("attributes")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(|| entry.as_object().cloned().unwrap_or_else(Map::new));
    if let Some(id) = entry.get("id") {
        record.insert("id".to_owned(), id.clone());
    }
    json!(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_entries_flatten_attributes() {
        let entry = json!({"id": 7, "attributes": {"title": "Atlas", "slug": "atlas"}});
        let record = flatten_entry(&entry);
        assert_eq!(record["id"], 7);
        assert_eq!(record["slug"], "atlas");
    }

    #[test]
    fn v5_entries_pass_through() {
        let entry = json!({"id": 7, "title": "Atlas", "slug": "atlas"});
        let record = flatten_entry(&entry);
        assert_eq!(record["slug"], "atlas");
    }

    #[test]
    fn webhook_target_reads_model_and_entry_slug() {
        let provider = StrapiProvider::new(StrapiSettings::default(), reqwest::Client::new());
        let payload = json!({"model": "post", "entry": {"Slug": "hello"}});
        assert_eq!(
            provider.webhook_target(&payload),
            WebhookTarget::item("post", "hello")
        );
    }
}
