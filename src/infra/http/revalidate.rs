//! `GET /api/revalidate`: operator- and scheduler-facing invalidation.
//!
//! Callers pick at most one scope per parameter; with none given the whole
//! content cache is flushed. `warm` re-requests a comma-separated list of
//! paths afterwards.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{AppState, constant_time_eq};

#[derive(Debug, Deserialize)]
pub struct RevalidateParams {
    pub secret: Option<String>,
    pub tag: Option<String>,
    pub collection: Option<String>,
    pub path: Option<String>,
    pub warm: Option<String>,
}

pub async fn revalidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RevalidateParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !authorized(&state, &headers, params.secret.as_deref()) {
        warn!("revalidation request rejected");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid secret"})),
        ));
    }

    let mut actions = Vec::new();

    if let Some(tag) = &params.tag {
        state.revalidation.revalidate_tag(tag);
        actions.push(format!("Revalidated tag: {tag}"));
    }
    if let Some(collection) = &params.collection {
        let (tag, _) = state.revalidation.revalidate_collection(collection);
        actions.push(format!("Revalidated collection: {collection} (tag: {tag})"));
    }
    if let Some(path) = &params.path {
        state.revalidation.revalidate_path(path);
        actions.push(format!("Revalidated path: {path}"));
    }
    if actions.is_empty() {
        state.revalidation.revalidate_all();
        actions.push(format!("Revalidated global tag: {}", crate::domain::GLOBAL_TAG));
    }

    if let Some(warm) = &params.warm {
        let paths: Vec<String> = warm
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                if p.starts_with('/') {
                    p.to_owned()
                } else {
                    format!("/{p}")
                }
            })
            .collect();
        if !paths.is_empty() {
            let report = state.revalidation.warm(&paths).await;
            actions.push(format!("Warmed {} paths", report.attempted()));
        }
    }

    info!(?actions, "revalidation request served");
    Ok(Json(json!({
        "revalidated": true,
        "now": unix_millis(),
        "actions": actions,
    })))
}

fn authorized(state: &AppState, headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(expected) = &state.auth.secret else {
        // No secret configured: open endpoint, intended for development.
        return true;
    };
    let scheduled = headers
        .get(state.auth.scheduler_header.as_str())
        .and_then(|v| v.to_str().ok())
        == Some("1");
    scheduled || secret.is_some_and(|s| constant_time_eq(s.as_bytes(), expected.as_bytes()))
}

fn unix_millis() -> i64 {
    let now = time::OffsetDateTime::now_utc();
    (now.unix_timestamp_nanos() / 1_000_000) as i64
}
