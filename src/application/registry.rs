//! Adapter registry: which providers exist, which are configured, and which
//! one serves a given collection.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::ContentRegistry;

use super::providers::ContentProvider;

pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn ContentProvider>>,
    content: Arc<ContentRegistry>,
}

impl AdapterRegistry {
    pub fn new(adapters: Vec<Arc<dyn ContentProvider>>, content: Arc<ContentRegistry>) -> Self {
        Self { adapters, content }
    }

    /// Adapters with usable credentials.
    pub fn active(&self) -> impl Iterator<Item = &Arc<dyn ContentProvider>> {
        self.adapters.iter().filter(|a| a.is_available())
    }

    /// Looks an adapter up by name whether or not it is configured; callers
    /// that need a usable one check `is_available` themselves.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn ContentProvider>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// The adapter serving a collection: its declared provider when that one
    /// is configured, otherwise the first configured adapter.
    pub fn adapter_for(&self, collection: &str) -> Option<Arc<dyn ContentProvider>> {
        if let Some(declared) = self.content.provider_for(collection) {
            match self.by_name(declared) {
                Some(adapter) if adapter.is_available() => return Some(adapter),
                Some(_) => warn!(
                    collection,
                    provider = declared,
                    "declared provider is not configured, falling back"
                ),
                None => warn!(collection, provider = declared, "unknown declared provider"),
            }
        }
        self.active().next().cloned()
    }

    /// Startup diagnostic: one line naming the configured providers.
    pub fn log_configuration(&self) {
        let active: Vec<&str> = self.active().map(|a| a.name()).collect();
        if active.is_empty() {
            warn!("no content providers configured, all reads will be empty");
        } else {
            info!(providers = ?active, "content providers configured");
        }
        for collection in self.content.collections() {
            match self.adapter_for(collection) {
                Some(adapter) => {
                    info!(collection, provider = adapter.name(), "collection wired")
                }
                None => warn!(collection, "no adapter available for collection"),
            }
        }
    }
}
