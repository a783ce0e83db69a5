//! `POST /api/webhook/{provider}`: CMS change notifications.
//!
//! Delivery handling is ordered so that nothing is invalidated on a bad
//! request: verify the signature against the raw body first, then parse,
//! then check the adapter is usable, and only then touch the caches.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{info, warn};

use crate::application::WebhookVerification;

use super::{AppState, constant_time_eq};

type HmacSha256 = Hmac<Sha256>;

type Reply = (StatusCode, Json<Value>);

fn reply(status: StatusCode, body: Value) -> Reply {
    (status, Json(body))
}

pub async fn ingest(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Reply {
    let Some(adapter) = state.adapters.by_name(&provider) else {
        return reply(
            StatusCode::NOT_FOUND,
            json!({"message": format!("Unknown provider: {provider}")}),
        );
    };

    if !verify(&adapter.webhook_verification(), &headers, &body) {
        warn!(provider, "webhook signature rejected");
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"message": "Invalid signature"}),
        );
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(provider, error = %err, "webhook payload failed to parse");
            return reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "Error processing webhook", "error": err.to_string()}),
            );
        }
    };

    if !adapter.is_available() {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"message": format!("{provider} adapter not available")}),
        );
    }

    let target = adapter.webhook_target(&payload);
    info!(
        provider,
        collection = target.collection.as_deref(),
        slug = target.slug.as_deref(),
        "webhook accepted"
    );
    metrics::counter!("brezza_webhooks_total", "provider" => provider.clone()).increment(1);

    let outcome = state.revalidation.handle_webhook(adapter.as_ref(), target).await;
    reply(
        StatusCode::OK,
        json!({
            "received": true,
            "processed": true,
            "actions": outcome.actions,
            "warmedPaths": outcome.warmed_paths,
        }),
    )
}

/// Checks a delivery against the provider's verification scheme. Schemes
/// with no configured secret are permissive; that is logged at startup, not
/// per delivery.
fn verify(scheme: &WebhookVerification, headers: &HeaderMap, body: &[u8]) -> bool {
    match scheme {
        WebhookVerification::HmacSha256 {
            header,
            secret: Some(secret),
        } => headers
            .get(*header)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|signature| hmac_matches(secret, signature, body)),
        WebhookVerification::Basic {
            fallback_header,
            secret: Some(secret),
        } => match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some(auth) => auth
                .strip_prefix("Basic ")
                .and_then(|encoded| BASE64.decode(encoded).ok())
                .is_some_and(|decoded| constant_time_eq(&decoded, secret.as_bytes())),
            // Some hooks are configured without credentials; the custom
            // header is a weak liveness marker in that case.
            None => headers.contains_key(*fallback_header),
        },
        WebhookVerification::HeaderToken {
            header,
            secret: Some(secret),
        } => headers
            .get(*header)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|token| constant_time_eq(token.as_bytes(), secret.as_bytes())),
        WebhookVerification::HmacSha256 { secret: None, .. }
        | WebhookVerification::Basic { secret: None, .. }
        | WebhookVerification::HeaderToken { secret: None, .. }
        | WebhookVerification::Unverified => true,
    }
}

/// Hex HMAC-SHA256 comparison; an optional `sha256=` prefix is accepted.
fn hmac_matches(secret: &str, signature: &str, body: &[u8]) -> bool {
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}
