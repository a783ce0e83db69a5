use std::process::ExitCode;
use std::sync::Arc;

use tracing::info;

use brezza::application::{
    AdapterRegistry, AppError, ContentService, RevalidationService,
};
use brezza::cache::middleware::ResponseCacheState;
use brezza::cache::{ObjectStore, ResponseStore};
use brezza::config;
use brezza::domain::ContentRegistry;
use brezza::infra::error::InfraError;
use brezza::infra::http::{AppState, RevalidationAuth, build_router};
use brezza::infra::warmer::CacheWarmer;
use brezza::infra::{cms, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("brezza: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let settings = config::load().map_err(InfraError::from)?;
    telemetry::init(&settings.logging)?;

    let client = reqwest::Client::builder()
        .build()
        .map_err(InfraError::from)?;

    let registry = Arc::new(ContentRegistry::portfolio());
    let adapters = Arc::new(AdapterRegistry::new(
        cms::build_adapters(&settings.providers, client.clone()),
        registry.clone(),
    ));
    adapters.log_configuration();

    let cache_config = Arc::new(settings.cache.clone());
    let store = Arc::new(ObjectStore::new());
    let responses = Arc::new(ResponseStore::new(cache_config.response_limit));
    let warmer = Arc::new(CacheWarmer::new(
        client,
        settings.revalidation.warm_base_url.clone(),
        cache_config.warm_timeout,
        cache_config.warm_retries,
    ));

    let content = Arc::new(ContentService::new(
        adapters.clone(),
        registry.clone(),
        store.clone(),
        cache_config.clone(),
    ));
    let revalidation = Arc::new(RevalidationService::new(
        store,
        responses.clone(),
        warmer,
        registry.clone(),
    ));

    let state = AppState {
        content,
        revalidation,
        adapters,
        registry,
        auth: Arc::new(RevalidationAuth {
            secret: settings.revalidation.secret.clone(),
            scheduler_header: settings.revalidation.scheduler_header.clone(),
        }),
    };
    if state.auth.secret.is_none() {
        tracing::warn!("no revalidation secret configured, /api/revalidate is open");
    }
    let router = build_router(
        state,
        ResponseCacheState {
            config: cache_config,
            responses,
        },
    );

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "brezza listening");
    axum::serve(listener, router)
        .await
        .map_err(InfraError::from)?;
    Ok(())
}
