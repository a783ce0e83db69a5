//! Provider adapters.
//!
//! One module per CMS backend, each exposing a struct that implements
//! [`ContentProvider`](crate::application::ContentProvider). Adapters are
//! always constructed; ones missing credentials simply report themselves
//! unavailable and are skipped by the registry.

pub mod contentful;
pub mod ghost;
pub mod hygraph;
pub mod notion;
pub mod sanity;
pub mod strapi;

use std::sync::Arc;

use serde_json::Value;

use crate::application::ContentProvider;
use crate::config::ProvidersSettings;

/// Builds the full adapter set in declaration order; that order doubles as
/// the fallback preference for collections whose declared provider is down.
pub fn build_adapters(
    settings: &ProvidersSettings,
    client: reqwest::Client,
) -> Vec<Arc<dyn ContentProvider>> {
    vec![
        Arc::new(notion::NotionProvider::new(
            settings.notion.clone(),
            client.clone(),
        )),
        Arc::new(contentful::ContentfulProvider::new(
            settings.contentful.clone(),
            client.clone(),
        )),
        Arc::new(sanity::SanityProvider::new(
            settings.sanity.clone(),
            client.clone(),
        )),
        Arc::new(strapi::StrapiProvider::new(
            settings.strapi.clone(),
            client.clone(),
        )),
        Arc::new(ghost::GhostProvider::new(
            settings.ghost.clone(),
            client.clone(),
        )),
        Arc::new(hygraph::HygraphProvider::new(settings.hygraph.clone(), client)),
    ]
}

/// Reads a nested string out of arbitrary JSON, `None` on any shape mismatch.
pub(crate) fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_str()
}
