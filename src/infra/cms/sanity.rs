//! Sanity adapter, against the GROQ query API.

use async_trait::async_trait;
use serde_json::Value;

use crate::application::providers::{
    ContentProvider, ProviderError, Record, WebhookTarget, WebhookVerification,
};
use crate::config::SanitySettings;

use super::str_at;

const API_VERSION: &str = "v2023-08-01";

pub struct SanityProvider {
    settings: SanitySettings,
    client: reqwest::Client,
}

impl SanityProvider {
    pub fn new(settings: SanitySettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((
            self.settings.project_id.as_deref()?,
            self.settings.dataset.as_deref()?,
        ))
    }

    async fn query(&self, groq: &str) -> Result<Value, ProviderError> {
        let (project_id, dataset) = self
            .credentials()
            .ok_or(ProviderError::Unavailable("sanity"))?;

        let response = self
            .client
            .get(format!(
                "https://{project_id}.api.sanity.io/{API_VERSION}/data/query/{dataset}"
            ))
            .query(&[("query", groq)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Upstream {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        body.get("result")
            .cloned()
            .ok_or_else(|| ProviderError::Decode("missing `result`".into()))
    }
}

#[async_trait]
impl ContentProvider for SanityProvider {
    fn name(&self) -> &'static str {
        "sanity"
    }

    fn is_available(&self) -> bool {
        self.credentials().is_some()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError> {
        let groq = format!(r#"*[_type == "{}"]"#, escape(collection));
        match self.query(&groq).await? {
            Value::Array(records) => Ok(records),
            _ => Err(ProviderError::Decode("query result is not an array".into())),
        }
    }

    async fn get(&self, collection: &str, slug: &str) -> Result<Option<Record>, ProviderError> {
        let groq = format!(
            r#"*[_type == "{}" && slug.current == "{}"][0]"#,
            escape(collection),
            escape(slug)
        );
        match self.query(&groq).await? {
            Value::Null => Ok(None),
            record => Ok(Some(record)),
        }
    }

    fn webhook_target(&self, payload: &Value) -> WebhookTarget {
        WebhookTarget {
            collection: str_at(payload, &["_type"]).map(str::to_owned),
            slug: str_at(payload, &["slug", "current"]).map(str::to_owned),
        }
    }

    fn webhook_verification(&self) -> WebhookVerification {
        WebhookVerification::HmacSha256 {
            header: "sanity-webhook-signature",
            secret: self.settings.webhook_secret.clone(),
        }
    }
}

/// Keeps interpolated identifiers from escaping their GROQ string literal.
fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn webhook_target_uses_type_and_current_slug() {
        let provider = SanityProvider::new(SanitySettings::default(), reqwest::Client::new());
        let payload = json!({"_type": "post", "slug": {"current": "hello"}});
        assert_eq!(
            provider.webhook_target(&payload),
            WebhookTarget::item("post", "hello")
        );
        assert_eq!(
            provider.webhook_target(&json!({"_type": "post"})),
            WebhookTarget::collection("post")
        );
    }

    #[test]
    fn groq_string_literals_are_escaped() {
        assert_eq!(escape(r#"po"st"#), r#"po\"st"#);
        assert_eq!(escape("plain"), "plain");
    }
}
