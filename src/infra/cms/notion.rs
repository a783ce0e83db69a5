//! Notion adapter.
//!
//! Serves the `cases` collection from a single Notion database. Pages are
//! flattened into plain JSON records; the Notion property model (title,
//! rich_text, files, multi_select) stays contained in this module.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::application::providers::{
    ContentProvider, ProviderError, Record, WebhookTarget, WebhookVerification,
};
use crate::config::NotionSettings;

use super::str_at;

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

pub struct NotionProvider {
    settings: NotionSettings,
    client: reqwest::Client,
}

impl NotionProvider {
    pub fn new(settings: NotionSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        Some((
            self.settings.token.as_deref()?,
            self.settings.database_id.as_deref()?,
        ))
    }

    async fn query_database(&self) -> Result<Vec<Record>, ProviderError> {
        let (token, database_id) = self
            .credentials()
            .ok_or(ProviderError::Unavailable("notion"))?;

        let response = self
            .client
            .post(format!("{NOTION_API}/databases/{database_id}/query"))
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({
                "page_size": 100,
                "filter": {
                    "property": "Publish",
                    "checkbox": { "equals": true }
                }
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Upstream {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        let pages = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Decode("missing `results` array".into()))?;

        let records = pages.iter().filter_map(page_to_record).collect::<Vec<_>>();
        debug!(pages = pages.len(), records = records.len(), "queried notion database");
        Ok(records)
    }
}

#[async_trait]
impl ContentProvider for NotionProvider {
    fn name(&self) -> &'static str {
        "notion"
    }

    fn is_available(&self) -> bool {
        self.credentials().is_some()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, ProviderError> {
        if collection != "cases" {
            return Ok(Vec::new());
        }
        self.query_database().await
    }

    async fn get(&self, collection: &str, slug: &str) -> Result<Option<Record>, ProviderError> {
        let records = self.list(collection).await?;
        let exact = records
            .iter()
            .find(|record| str_at(record, &["slug"]) == Some(slug));
        if let Some(record) = exact {
            return Ok(Some(record.clone()));
        }
        // Slugs are derived from titles, which get edited; fall back to
        // matching on the first word so stale links keep resolving.
        let head = slug.split('-').next().unwrap_or(slug);
        Ok(records
            .iter()
            .find(|record| {
                str_at(record, &["slug"]).is_some_and(|s| !head.is_empty() && s.starts_with(head))
            })
            .cloned())
    }

    fn webhook_target(&self, payload: &Value) -> WebhookTarget {
        let slug = str_at(payload, &["slug"])
            .or_else(|| str_at(payload, &["data", "slug"]))
            .or_else(|| str_at(payload, &["entity", "slug"]));
        match slug {
            Some(slug) => WebhookTarget::item("cases", slug),
            None => WebhookTarget::collection("cases"),
        }
    }

    fn webhook_verification(&self) -> WebhookVerification {
        WebhookVerification::HmacSha256 {
            header: "notion-signature",
            secret: self.settings.webhook_secret.clone(),
        }
    }
}

/// Flattens one database page, skipping unpublished pages and pages without
/// a title.
fn page_to_record(page: &Value) -> Option<Record> {
    let properties = page.get("properties")?;
    let title = rich_text(properties.get("Title").or_else(|| properties.get("Name"))?)?;
    if title.is_empty() {
        return None;
    }
    let slug = properties
        .get("Slug")
        .and_then(rich_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&title));

    Some(json!({
        "id": page.get("id").cloned().unwrap_or(Value::Null),
        "title": title,
        "slug": slug,
        "description": properties.get("Description").and_then(rich_text),
        "team": properties.get("Team").and_then(rich_text),
        "categoryTags": properties.get("Category").map(multi_select).unwrap_or_default(),
        "introImage": properties.get("Intro Image").and_then(first_file_url),
        "thumbnail": properties.get("Thumbnail").and_then(first_file_url),
        "projectMedia": properties.get("Project Media").map(file_urls).unwrap_or_default(),
        "link": str_at(properties, &["Link", "url"]),
        "comingSoon": properties
            .get("Coming Soon")
            .and_then(|p| p.get("checkbox"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }))
}

/// Joins a title or rich_text property into one plain string.
fn rich_text(property: &Value) -> Option<String> {
    let fragments = property
        .get("title")
        .or_else(|| property.get("rich_text"))?
        .as_array()?;
    Some(
        fragments
            .iter()
            .filter_map(|f| str_at(f, &["plain_text"]))
            .collect::<Vec<_>>()
            .join(""),
    )
}

fn multi_select(property: &Value) -> Vec<String> {
    property
        .get("multi_select")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|o| str_at(o, &["name"]).map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

fn file_urls(property: &Value) -> Vec<String> {
    property
        .get("files")
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(|f| {
                    str_at(f, &["file", "url"]).or_else(|| str_at(f, &["external", "url"]))
                })
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn first_file_url(property: &Value) -> Option<String> {
    file_urls(property).into_iter().next()
}

/// Derives a URL slug from a page title: lowercase, punctuation dropped,
/// whitespace runs collapsed to single hyphens.
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(secret: Option<&str>) -> NotionProvider {
        NotionProvider::new(
            NotionSettings {
                token: Some("secret_token".into()),
                database_id: Some("db".into()),
                webhook_secret: secret.map(str::to_owned),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn availability_requires_token_and_database() {
        assert!(provider(None).is_available());
        let partial = NotionProvider::new(
            NotionSettings {
                token: Some("secret_token".into()),
                database_id: None,
                webhook_secret: None,
            },
            reqwest::Client::new(),
        );
        assert!(!partial.is_available());
    }

    #[test]
    fn slugify_collapses_titles() {
        assert_eq!(slugify("Maitreya, a Field Guide"), "maitreya-a-field-guide");
        assert_eq!(slugify("  Spaced   Out  "), "spaced-out");
        assert_eq!(slugify("Already-Slugged"), "already-slugged");
    }

    #[test]
    fn pages_without_titles_are_skipped() {
        let page = json!({"id": "p1", "properties": {"Title": {"title": []}}});
        assert!(page_to_record(&page).is_none());
    }

    #[test]
    fn pages_flatten_to_plain_records() {
        let page = json!({
            "id": "p1",
            "properties": {
                "Title": {"title": [{"plain_text": "Atlas "}, {"plain_text": "Shrugged"}]},
                "Slug": {"rich_text": []},
                "Description": {"rich_text": [{"plain_text": "A case study"}]},
                "Category": {"multi_select": [{"name": "design"}, {"name": "web"}]},
                "Thumbnail": {"files": [{"external": {"url": "https://img/thumb.png"}}]},
                "Link": {"url": "https://example.com"},
                "Coming Soon": {"type": "checkbox", "checkbox": false}
            }
        });
        let record = page_to_record(&page).unwrap();
        assert_eq!(record["title"], "Atlas Shrugged");
        assert_eq!(record["slug"], "atlas-shrugged");
        assert_eq!(record["description"], "A case study");
        assert_eq!(record["categoryTags"], json!(["design", "web"]));
        assert_eq!(record["thumbnail"], "https://img/thumb.png");
        assert_eq!(record["comingSoon"], false);
    }

    #[test]
    fn webhook_target_tolerates_any_shape() {
        let p = provider(Some("whsec"));
        assert_eq!(
            p.webhook_target(&json!({"slug": "atlas"})),
            WebhookTarget::item("cases", "atlas")
        );
        assert_eq!(
            p.webhook_target(&json!({"entity": {"slug": "atlas"}})),
            WebhookTarget::item("cases", "atlas")
        );
        assert_eq!(
            p.webhook_target(&json!({})),
            WebhookTarget::collection("cases")
        );
        assert_eq!(
            p.webhook_target(&json!(null)),
            WebhookTarget::collection("cases")
        );
    }

    #[test]
    fn webhooks_are_hmac_verified() {
        match provider(Some("whsec")).webhook_verification() {
            WebhookVerification::HmacSha256 { header, secret } => {
                assert_eq!(header, "notion-signature");
                assert_eq!(secret.as_deref(), Some("whsec"));
            }
            other => panic!("unexpected scheme: {other:?}"),
        }
    }
}
