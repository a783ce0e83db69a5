//! brezza: a caching and revalidation layer for CMS-backed sites.
//!
//! Content lives in an external headless CMS; brezza serves it from a
//! tagged, TTL-bound cache, accepts change webhooks from the CMS to
//! invalidate precisely, and re-warms the affected pages afterwards.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
