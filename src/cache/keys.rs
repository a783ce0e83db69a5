//! Key types for the two cache layers.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Key for one cached content object: a collection plus an optional slug.
/// Renders as `<collection>:<slug>` for items and `<collection>:list` for
/// whole-collection reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub collection: String,
    pub slug: Option<String>,
}

impl CacheKey {
    pub fn list(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            slug: None,
        }
    }

    pub fn item(collection: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            slug: Some(slug.into()),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slug {
            Some(slug) => write!(f, "{}:{}", self.collection, slug),
            None => write!(f, "{}:list", self.collection),
        }
    }
}

/// Key for one cached HTTP response. The query string is hashed rather than
/// stored so pathological query strings cannot bloat the key set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub path: String,
    pub query_hash: u64,
}

impl ResponseKey {
    pub fn new(path: impl Into<String>, query: Option<&str>) -> Self {
        Self {
            path: path.into(),
            query_hash: hash_query(query.unwrap_or("")),
        }
    }
}

pub fn hash_query(query: &str) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}
