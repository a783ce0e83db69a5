//! HTTP surface: content routes generated from the registry, the status
//! document, the revalidation endpoint, and the per-provider webhook routes.

pub mod content;
pub mod revalidate;
pub mod webhook;

use std::collections::HashSet;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::middleware;
use axum::routing::{get, post};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::application::{AdapterRegistry, ContentService, RevalidationService};
use crate::cache::middleware::{ResponseCacheState, response_cache};
use crate::domain::ContentRegistry;
use crate::domain::content::SLUG_PLACEHOLDER;

/// Secret accepted by `GET /api/revalidate`, plus the header that marks
/// trusted scheduler traffic.
#[derive(Debug)]
pub struct RevalidationAuth {
    pub secret: Option<String>,
    pub scheduler_header: String,
}

#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentService>,
    pub revalidation: Arc<RevalidationService>,
    pub adapters: Arc<AdapterRegistry>,
    pub registry: Arc<ContentRegistry>,
    pub auth: Arc<RevalidationAuth>,
}

pub fn build_router(state: AppState, cache: ResponseCacheState) -> Router {
    let mut pages = Router::new()
        .route("/", get(content::status_document))
        .route("/healthz", get(content::healthz));

    let mut mounted = HashSet::new();
    for entry in state.registry.entries() {
        let route = axum_path(&entry.path);
        if !mounted.insert(route.clone()) {
            continue;
        }
        let cfg = entry.clone();
        if entry.has_slug() {
            let handler = move |state: State<AppState>, slug: Path<String>| {
                let cfg = cfg.clone();
                async move { content::item(state, cfg, slug).await }
            };
            pages = pages.route(&route, get(handler));
        } else {
            let handler = move |state: State<AppState>| {
                let cfg = cfg.clone();
                async move { content::list(state, cfg).await }
            };
            pages = pages.route(&route, get(handler));
        }
    }
    let pages = pages.layer(middleware::from_fn_with_state(cache, response_cache));

    let api = Router::new()
        .route("/api/revalidate", get(revalidate::revalidate))
        .route("/api/webhook/{provider}", post(webhook::ingest));

    pages.merge(api).with_state(state)
}

/// Registry templates use `[slug]`; axum wants `{slug}`.
fn axum_path(template: &str) -> String {
    template.replace(SLUG_PLACEHOLDER, "{slug}")
}

/// Length-independent comparison for shared secrets.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let a = Sha256::digest(a);
    let b = Sha256::digest(b);
    a.ct_eq(&b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_translate_to_axum_captures() {
        assert_eq!(axum_path("/work/[slug]"), "/work/{slug}");
        assert_eq!(axum_path("/work"), "/work");
    }

    #[test]
    fn secret_comparison_handles_unequal_lengths() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(!constant_time_eq(b"", b"secret"));
    }
}
