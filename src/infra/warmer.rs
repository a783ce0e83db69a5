//! Cache warmer.
//!
//! After an invalidation we optionally re-request the affected pages through
//! the front door so the next visitor hits a warm cache. Warming is strictly
//! best effort: every path is attempted, failures are logged and reported,
//! and nothing propagates as an error.

use std::time::{Duration, Instant};

use futures::future::join_all;
use reqwest::header::{CACHE_CONTROL, USER_AGENT};
use tracing::{info, warn};
use url::Url;

const WARMER_USER_AGENT: &str = "CMS-Cache-Warmer/1.0";

/// Which paths came back and which did not. A completed request counts as
/// warmed even on a non-2xx status; only transport failures count as failed.
#[derive(Debug, Default)]
pub struct WarmReport {
    pub warmed: Vec<String>,
    pub failed: Vec<String>,
}

impl WarmReport {
    pub fn attempted(&self) -> usize {
        self.warmed.len() + self.failed.len()
    }
}

pub struct CacheWarmer {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    retries: u32,
}

impl CacheWarmer {
    pub fn new(client: reqwest::Client, base_url: Url, timeout: Duration, retries: u32) -> Self {
        Self {
            client,
            base_url,
            timeout,
            retries,
        }
    }

    /// Requests every path concurrently and waits for all of them to settle.
    pub async fn warm(&self, paths: &[String]) -> WarmReport {
        let started = Instant::now();
        let outcomes = join_all(paths.iter().map(|path| self.warm_path(path))).await;

        let mut report = WarmReport::default();
        for (path, outcome) in paths.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.warmed.push(path.clone()),
                Err(()) => report.failed.push(path.clone()),
            }
        }
        metrics::histogram!("brezza_warm_seconds").record(started.elapsed().as_secs_f64());
        metrics::counter!("brezza_warm_paths_total").increment(report.warmed.len() as u64);
        info!(
            warmed = report.warmed.len(),
            failed = report.failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cache warming settled"
        );
        report
    }

    async fn warm_path(&self, path: &str) -> Result<(), ()> {
        let url = match self.base_url.join(path) {
            Ok(url) => url,
            Err(err) => {
                warn!(path, error = %err, "unwarmable path");
                return Err(());
            }
        };

        let mut attempt = 0;
        loop {
            let result = self
                .client
                .get(url.clone())
                .timeout(self.timeout)
                .header(USER_AGENT, WARMER_USER_AGENT)
                .header(CACHE_CONTROL, "no-store")
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!(path, "warmed");
                    return Ok(());
                }
                Ok(response) => {
                    warn!(path, status = response.status().as_u16(), "warming got non-success status");
                    return Ok(());
                }
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    warn!(path, attempt, error = %err, "warming attempt failed, retrying");
                }
                Err(err) => {
                    warn!(path, error = %err, "warming failed");
                    return Err(());
                }
            }
        }
    }
}
