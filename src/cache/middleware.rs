//! Response cache middleware.
//!
//! Successful GET responses from the content routes are captured into the
//! [`ResponseStore`](super::ResponseStore) and replayed until something
//! invalidates their path. Only complete 200 responses are cached; anything
//! else passes through untouched.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::ResponseKey;
use super::store::{CachedResponse, ResponseStore};

/// Largest response body the cache will buffer, 4 MiB.
const MAX_CACHED_BODY: usize = 4 * 1024 * 1024;

static CACHE_STATUS: HeaderName = HeaderName::from_static("x-brezza-cache");

#[derive(Clone)]
pub struct ResponseCacheState {
    pub config: Arc<CacheConfig>,
    pub responses: Arc<ResponseStore>,
}

pub async fn response_cache(
    State(state): State<ResponseCacheState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.response_cache || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = ResponseKey::new(request.uri().path(), request.uri().query());
    if let Some(cached) = state.responses.get(&key) {
        metrics::counter!("brezza_response_cache_hits_total").increment(1);
        return replay(cached, "hit");
    }
    metrics::counter!("brezza_response_cache_misses_total").increment(1);

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(body) => body,
        Err(err) => {
            warn!(path = %key.path, error = %err, "failed to buffer response for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter(|(name, _)| *name != header::SET_COOKIE)
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect(),
        body: body.clone(),
    };
    debug!(path = %key.path, bytes = body.len(), "cached response");
    state.responses.put(key, cached);

    let mut response = Response::from_parts(parts, Body::from(body));
    response
        .headers_mut()
        .insert(CACHE_STATUS.clone(), HeaderValue::from_static("miss"));
    response
}

fn replay(cached: CachedResponse, status_label: &'static str) -> Response {
    let mut builder = Response::builder().status(cached.status);
    for (name, value) in &cached.headers {
        builder = builder.header(name, value);
    }
    builder = builder.header(&CACHE_STATUS, status_label);
    match builder.body(Body::from(cached.body)) {
        Ok(response) => response,
        // A cached header stopped round-tripping; serve uncached instead.
        Err(err) => {
            warn!(error = %err, "failed to replay cached response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
