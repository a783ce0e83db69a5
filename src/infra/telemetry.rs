//! Tracing and metrics bootstrap.

use std::sync::Once;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static DESCRIBE: Once = Once::new();

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured level so ad-hoc debugging needs no config edit.
pub fn init(settings: &LoggingSettings) -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|err| InfraError::Telemetry(err.to_string()))?;

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let result = match settings.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };
    result.map_err(|err| InfraError::Telemetry(err.to_string()))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions once per process, harmless without an
/// installed recorder.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        metrics::describe_counter!(
            "brezza_content_cache_hits_total",
            "Content object reads served from the cache"
        );
        metrics::describe_counter!(
            "brezza_content_cache_misses_total",
            "Content object reads that went to a provider"
        );
        metrics::describe_counter!(
            "brezza_provider_fetch_errors_total",
            "Provider fetches that failed or timed out"
        );
        metrics::describe_counter!(
            "brezza_object_cache_invalidations_total",
            "Content objects dropped by tag invalidation"
        );
        metrics::describe_counter!(
            "brezza_response_cache_hits_total",
            "HTTP responses replayed from the response cache"
        );
        metrics::describe_counter!(
            "brezza_response_cache_misses_total",
            "HTTP responses rendered and considered for caching"
        );
        metrics::describe_counter!(
            "brezza_webhooks_total",
            "Webhook deliveries accepted, labeled by provider"
        );
        metrics::describe_counter!(
            "brezza_warm_paths_total",
            "Paths successfully re-requested by the cache warmer"
        );
        metrics::describe_histogram!(
            "brezza_provider_fetch_seconds",
            "Duration of provider fetches"
        );
        metrics::describe_histogram!(
            "brezza_warm_seconds",
            "Duration of complete warming passes"
        );
    });
}
