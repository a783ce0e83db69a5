//! Content routes and the service status document.
//!
//! Content reads never fail outward: a missing item is `null`, an
//! unreachable provider is an empty list, and the page renders its empty
//! state. The interesting failures are in the logs and metrics.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::domain::ContentConfig;

use super::AppState;

/// Serves a collection's list view. Always 200; an unavailable backend is
/// an empty array.
pub async fn list(State(state): State<AppState>, cfg: ContentConfig) -> Json<Value> {
    let collection = cfg.collection().to_owned();
    let value = state
        .content
        .get_cached_with_ttl(&collection, None, cfg.revalidate)
        .await;
    Json(value.unwrap_or_else(|| json!([])))
}

/// Serves one item. A missing or unfetchable item is `null`, not a 404, so
/// consumers can distinguish "cache says nothing" from routing errors.
pub async fn item(
    State(state): State<AppState>,
    cfg: ContentConfig,
    Path(slug): Path<String>,
) -> Json<Value> {
    let collection = cfg.collection().to_owned();
    let value = state
        .content
        .get_cached_with_ttl(&collection, Some(&slug), cfg.revalidate)
        .await;
    Json(value.unwrap_or(Value::Null))
}

/// `GET /`: what this instance serves and through which providers.
pub async fn status_document(State(state): State<AppState>) -> Json<Value> {
    let collections: Vec<Value> = state
        .registry
        .entries()
        .iter()
        .map(|entry| {
            json!({
                "key": entry.key,
                "path": entry.path,
                "tag": entry.tag,
                "provider": entry.provider,
                "revalidateSeconds": entry.revalidate.as_secs(),
                "active": state.adapters.adapter_for(entry.collection()).is_some(),
            })
        })
        .collect();
    let providers: Vec<&str> = state.adapters.active().map(|a| a.name()).collect();

    Json(json!({
        "name": "brezza",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": providers,
        "globalTag": crate::domain::GLOBAL_TAG,
        "collections": collections,
        "endpoints": {
            "revalidate": "/api/revalidate",
            "webhook": "/api/webhook/{provider}",
        },
    }))
}

pub async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
