use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reviewer_client::{
    cache::{DEFAULT_REVIEW_FRESHNESS, DEFAULT_STREAM_FRESHNESS},
    default_data_dir,
    fetch::{DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_REVIEW_BASE_URL, DEFAULT_STREAM_BASE_URL},
    DocumentSource, FetcherConfig, HttpFetcher, DEFAULT_EXTRACTION_TIMEOUT,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub mod error;
pub mod services;
pub mod state;
pub mod transport;

pub use error::LookupError;
pub use services::{ReviewService, StreamCountService};
use state::AppContext;

pub const DEFAULT_BIND: &str = "127.0.0.1:8097";

/// Configuration inputs required to bootstrap the lookup runtime.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Optional override for the directory holding both cache files.
    pub data_dir: Option<PathBuf>,
    pub bind: SocketAddr,
    pub review_base_url: String,
    pub stream_base_url: String,
    pub review_timeout: Duration,
    pub stream_timeout: Duration,
    pub max_document_bytes: u64,
    /// Wall-clock ceiling for each extraction pass.
    pub regex_timeout: Duration,
    /// `None` keeps reviews until they are replaced.
    pub review_freshness: Option<time::Duration>,
    pub stream_freshness: time::Duration,
    /// Timestamp captured during process initialization for diagnostics.
    pub boot_timestamp: OffsetDateTime,
    pub mode: ServerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Http,
    Headless,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            bind: SocketAddr::from(([127, 0, 0, 1], 8097)),
            review_base_url: DEFAULT_REVIEW_BASE_URL.to_string(),
            stream_base_url: DEFAULT_STREAM_BASE_URL.to_string(),
            review_timeout: Duration::from_secs(10),
            stream_timeout: Duration::from_secs(8),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            regex_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            review_freshness: Some(DEFAULT_REVIEW_FRESHNESS),
            stream_freshness: DEFAULT_STREAM_FRESHNESS,
            boot_timestamp: OffsetDateTime::now_utc(),
            mode: ServerMode::Http,
        }
    }
}

impl ServerConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            review_base_url: self.review_base_url.clone(),
            stream_base_url: self.stream_base_url.clone(),
            review_timeout: self.review_timeout,
            stream_timeout: self.stream_timeout,
            max_document_bytes: self.max_document_bytes,
            regex_timeout: self.regex_timeout,
            ..FetcherConfig::default()
        }
    }
}

#[derive(Clone)]
pub struct CoreRuntime {
    config: ServerConfig,
    context: Arc<AppContext>,
}

impl CoreRuntime {
    pub fn context(&self) -> Arc<AppContext> {
        self.context.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn serve(&self) -> Result<()> {
        match self.config.mode {
            ServerMode::Http => transport::serve_http(self.context.clone(), self.config.bind).await?,
            ServerMode::Headless => {
                debug!(target: "reviewer_core", "Headless mode: skipping transport loop");
            }
        }
        Ok(())
    }
}

/// Builds the runtime against the live sites.
pub async fn bootstrap(config: ServerConfig) -> Result<CoreRuntime> {
    let fetcher = HttpFetcher::new(config.fetcher_config()).context("failed to build HTTP client")?;
    bootstrap_with_source(config, Arc::new(fetcher)).await
}

/// Builds the runtime against any document source.
pub async fn bootstrap_with_source(
    config: ServerConfig,
    source: Arc<dyn DocumentSource>,
) -> Result<CoreRuntime> {
    let data_dir = config.resolved_data_dir();
    if let Err(error) = tokio::fs::create_dir_all(&data_dir).await {
        warn!(
            target: "reviewer_core",
            error = %error,
            data_dir = %data_dir.display(),
            "failed to create data directory; proceeding but cache writes may fail"
        );
    }

    let context = Arc::new(AppContext::open(&config, source).await);
    let cached_reviews = context.reviews.cache().len().await;
    let cached_tracks = context.streams.cache().len().await;
    info!(
        target: "reviewer_core",
        data_dir = %data_dir.display(),
        boot_timestamp = %config.boot_timestamp,
        mode = ?config.mode,
        cached_reviews,
        cached_tracks,
        "Core runtime starting"
    );

    Ok(CoreRuntime { config, context })
}

pub async fn run(config: ServerConfig) -> Result<()> {
    bootstrap(config).await?.serve().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn headless_runtime_completes() {
        let tmp = tempdir().expect("tempdir");
        let config = ServerConfig {
            data_dir: Some(tmp.path().join("data")),
            mode: ServerMode::Headless,
            ..ServerConfig::default()
        };
        let runtime = bootstrap(config).await.expect("bootstrap succeeds");
        assert!(tmp.path().join("data").is_dir());
        assert!(runtime.serve().await.is_ok());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.max_document_bytes, 5 * 1024 * 1024);
        assert_eq!(config.review_freshness, Some(time::Duration::days(30)));
        assert_eq!(config.stream_freshness, time::Duration::days(7));
        assert_eq!(config.fetcher_config().stream_timeout, Duration::from_secs(8));
    }
}
