//! Configuration loading.
//!
//! Settings come from an optional TOML file, environment variables with the
//! `BREZZA__` prefix (`BREZZA__SERVER__PORT=8080`), and command-line flags,
//! in that order of precedence. The raw tree is deserialized leniently and
//! then validated into [`Settings`]; anything malformed fails startup with a
//! message naming the offending key.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::cache::CacheConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
    #[error("invalid configuration `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "brezza", version, about = "Content cache and revalidation service")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Log filter, e.g. `info` or `brezza=debug`.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Shared secret for the revalidation endpoint.
    #[arg(long, env = "BREZZA_REVALIDATION_SECRET", hide_env_values = true)]
    pub revalidation_secret: Option<String>,

    /// Base URL the cache warmer requests pages from.
    #[arg(long, value_name = "URL")]
    pub warm_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSettings {
    server: RawServer,
    logging: RawLogging,
    cache: RawCache,
    revalidation: RawRevalidation,
    providers: RawProviders,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawServer {
    host: String,
    port: u16,
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLogging {
    level: String,
    format: String,
}

impl Default for RawLogging {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawCache {
    default_ttl_seconds: u64,
    fetch_timeout_seconds: u64,
    response_cache: bool,
    response_limit: usize,
    warm_timeout_seconds: u64,
    warm_retries: u32,
}

impl Default for RawCache {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 1800,
            fetch_timeout_seconds: 12,
            response_cache: true,
            response_limit: 200,
            warm_timeout_seconds: 10,
            warm_retries: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawRevalidation {
    secret: Option<String>,
    scheduler_header: String,
    warm_base_url: Option<String>,
}

impl Default for RawRevalidation {
    fn default() -> Self {
        Self {
            secret: None,
            scheduler_header: "x-scheduled-revalidation".to_owned(),
            warm_base_url: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawProviders {
    notion: NotionSettings,
    contentful: ContentfulSettings,
    sanity: SanitySettings,
    strapi: StrapiSettings,
    ghost: GhostSettings,
    hygraph: HygraphSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotionSettings {
    pub token: Option<String>,
    pub database_id: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentfulSettings {
    pub space_id: Option<String>,
    pub access_token: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SanitySettings {
    pub project_id: Option<String>,
    pub dataset: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrapiSettings {
    pub url: Option<String>,
    pub token: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GhostSettings {
    pub url: Option<String>,
    pub content_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HygraphSettings {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct RevalidationSettings {
    pub secret: Option<String>,
    pub scheduler_header: String,
    pub warm_base_url: Url,
}

#[derive(Debug, Clone, Default)]
pub struct ProvidersSettings {
    pub notion: NotionSettings,
    pub contentful: ContentfulSettings,
    pub sanity: SanitySettings,
    pub strapi: StrapiSettings,
    pub ghost: GhostSettings,
    pub hygraph: HygraphSettings,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
    pub revalidation: RevalidationSettings,
    pub providers: ProvidersSettings,
}

/// Loads settings for the current process, CLI included.
pub fn load() -> Result<Settings, LoadError> {
    load_from_cli(Cli::parse())
}

pub fn load_from_cli(cli: Cli) -> Result<Settings, LoadError> {
    let mut builder = config::Config::builder();
    match &cli.config {
        Some(path) => {
            builder = builder.add_source(config::File::from(path.as_path()));
        }
        None => {
            builder = builder.add_source(
                config::File::with_name("config/default").required(false),
            );
        }
    }
    let raw: RawSettings = builder
        .add_source(config::Environment::with_prefix("BREZZA").separator("__"))
        .build()?
        .try_deserialize()?;
    validate(raw, &cli)
}

fn validate(raw: RawSettings, cli: &Cli) -> Result<Settings, LoadError> {
    let host = cli.host.clone().unwrap_or(raw.server.host);
    let port = cli.port.unwrap_or(raw.server.port);
    let ip: IpAddr = host
        .parse()
        .map_err(|_| LoadError::invalid("server.host", format!("`{host}` is not an IP address")))?;
    if port == 0 {
        return Err(LoadError::invalid("server.port", "port must be nonzero"));
    }
    let addr = SocketAddr::new(ip, port);

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        match raw.logging.format.as_str() {
            "compact" => LogFormat::Compact,
            "json" => LogFormat::Json,
            other => {
                return Err(LoadError::invalid(
                    "logging.format",
                    format!("`{other}` is neither `compact` nor `json`"),
                ));
            }
        }
    };
    let logging = LoggingSettings {
        level: cli.log_level.clone().unwrap_or(raw.logging.level),
        format,
    };

    if raw.cache.default_ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            "TTL must be nonzero",
        ));
    }
    if raw.cache.fetch_timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.fetch_timeout_seconds",
            "timeout must be nonzero",
        ));
    }
    if raw.cache.response_limit == 0 {
        return Err(LoadError::invalid(
            "cache.response_limit",
            "limit must be nonzero",
        ));
    }
    let cache = CacheConfig {
        default_ttl: std::time::Duration::from_secs(raw.cache.default_ttl_seconds),
        fetch_timeout: std::time::Duration::from_secs(raw.cache.fetch_timeout_seconds),
        response_cache: raw.cache.response_cache,
        response_limit: raw.cache.response_limit,
        warm_timeout: std::time::Duration::from_secs(raw.cache.warm_timeout_seconds.max(1)),
        warm_retries: raw.cache.warm_retries,
    };

    let warm_base_url = cli
        .warm_base_url
        .clone()
        .or(raw.revalidation.warm_base_url)
        .unwrap_or_else(|| format!("http://{addr}"));
    let warm_base_url: Url = warm_base_url.parse().map_err(|err| {
        LoadError::invalid("revalidation.warm_base_url", format!("{err}"))
    })?;
    let revalidation = RevalidationSettings {
        secret: normalized(cli.revalidation_secret.clone().or(raw.revalidation.secret)),
        scheduler_header: raw.revalidation.scheduler_header.to_ascii_lowercase(),
        warm_base_url,
    };

    let providers = ProvidersSettings {
        notion: NotionSettings {
            token: normalized(raw.providers.notion.token),
            database_id: normalized(raw.providers.notion.database_id),
            webhook_secret: normalized(raw.providers.notion.webhook_secret),
        },
        contentful: ContentfulSettings {
            space_id: normalized(raw.providers.contentful.space_id),
            access_token: normalized(raw.providers.contentful.access_token),
            webhook_secret: normalized(raw.providers.contentful.webhook_secret),
        },
        sanity: SanitySettings {
            project_id: normalized(raw.providers.sanity.project_id),
            dataset: normalized(raw.providers.sanity.dataset),
            webhook_secret: normalized(raw.providers.sanity.webhook_secret),
        },
        strapi: StrapiSettings {
            url: normalized(raw.providers.strapi.url),
            token: normalized(raw.providers.strapi.token),
            webhook_secret: normalized(raw.providers.strapi.webhook_secret),
        },
        ghost: GhostSettings {
            url: normalized(raw.providers.ghost.url),
            content_api_key: normalized(raw.providers.ghost.content_api_key),
        },
        hygraph: HygraphSettings {
            endpoint: normalized(raw.providers.hygraph.endpoint),
            token: normalized(raw.providers.hygraph.token),
            webhook_secret: normalized(raw.providers.hygraph.webhook_secret),
        },
    };

    Ok(Settings {
        server: ServerSettings { addr },
        logging,
        cache,
        revalidation,
        providers,
    })
}

/// Treats whitespace-only values from the environment as absent.
fn normalized(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}
