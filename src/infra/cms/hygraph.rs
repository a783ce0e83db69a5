//! Hygraph adapter, against its GraphQL endpoint. Collections are assumed
//! to be the plural query field of the model, which matches Hygraph's
//! generated schema.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::application::providers::{
    ContentProvider, ProviderError, Record, WebhookTarget, WebhookVerification,
};
use crate::config::HygraphSettings;

use super::str_at;

pub struct HygraphProvider {
    settings: HygraphSettings,
    client: reqwest::Client,
}

impl HygraphProvider {
    pub fn new(settings: HygraphSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    async fn query(&self, query: String) -> Result<Value, ProviderError> {
        let endpoint = self
            .settings
            .endpoint
            .as_deref()
            .ok_or(ProviderError::Unavailable("hygraph"))?;

        let mut request = self.client.post(endpoint).json(&json!({ "query": query }));
        if let Some(token) = &self.settings.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Upstream {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(ProviderError::Decode(
                    str_at(&errors[0], &["message"]).unwrap_or("graphql error").to_owned(),
                ));
            }
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| ProviderError::Decode("missing `data`".into()))
    }
}

#[async_trait]
impl ContentProvider for HygraphProvider {
    fn name(&self) -> &'static str {
        "hygraph"
    }

    fn is_available(&self) -> bool {
        self.settings.endpoint.is_some()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError> {
        let field = field_name(collection);
        let data = self
            .query(format!("{{ {field} {{ id slug title }} }}"))
            .await?;
        data.get(&field)
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| ProviderError::Decode(format!("missing `{field}` field")))
    }

    async fn get(&self, collection: &str, slug: &str) -> Result<Option<Record>, ProviderError> {
        let field = field_name(collection);
        let data = self
            .query(format!(
                r#"{{ {field}(where: {{ slug: "{}" }}) {{ id slug title }} }}"#,
                slug.replace('"', "")
            ))
            .await?;
        Ok(data
            .get(&field)
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .cloned())
    }

    fn webhook_target(&self, payload: &Value) -> WebhookTarget {
        WebhookTarget {
            collection: str_at(payload, &["data", "__typename"]).map(str::to_owned),
            slug: str_at(payload, &["data", "slug"]).map(str::to_owned),
        }
    }

    fn webhook_verification(&self) -> WebhookVerification {
        WebhookVerification::HmacSha256 {
            header: "gcms-signature",
            secret: self.settings.webhook_secret.clone(),
        }
    }
}

/// GraphQL field names are lowerCamel; collection names arrive lowercase
/// already, so this is a sanitizing pass.
fn field_name(collection: &str) -> String {
    collection
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
