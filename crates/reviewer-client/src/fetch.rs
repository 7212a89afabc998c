//! Bounded HTTP retrieval of review and track pages.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
    extract::{bounded, ExtractError, DEFAULT_EXTRACTION_TIMEOUT},
    types::TrackQuery,
};

pub const DEFAULT_REVIEW_BASE_URL: &str = "https://www.imdb.com";
pub const DEFAULT_STREAM_BASE_URL: &str = "https://www.mystreamcount.com";
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024;
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[allow(clippy::expect_used)]
static CSRF_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta\s+name="csrf-token"\s+content="([^"]+)""#).expect("csrf token regex")
});

#[allow(clippy::expect_used)]
static FIRST_RESULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="(/track/[^"?#]+)[^"]*""#).expect("search result regex"));

const SEARCH_RESULTS_MARKER: &str = r#"class="search-results""#;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("response exceeds {limit} bytes (declared: {declared:?})")]
    TooLarge { limit: u64, declared: Option<u64> },
    #[error("unexpected status code: {0}")]
    Status(StatusCode),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("expected {0} not found in page")]
    MissingStructure(&'static str),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(error.to_string())
        }
    }
}

/// Source of raw page text for the orchestrator.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Reviews page for a title identifier.
    async fn reviews_page(&self, title_id: &str) -> Result<String, FetchError>;

    /// Track page, reached directly by external ID or through site search.
    async fn track_page(&self, query: &TrackQuery) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub review_base_url: String,
    pub stream_base_url: String,
    pub review_timeout: Duration,
    pub stream_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_document_bytes: u64,
    /// Budget for pattern lookups performed during the search flow.
    pub regex_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            review_base_url: DEFAULT_REVIEW_BASE_URL.to_string(),
            stream_base_url: DEFAULT_STREAM_BASE_URL.to_string(),
            review_timeout: Duration::from_secs(10),
            stream_timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(5),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            regex_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct HttpFetcher {
    reviews: Client,
    tracks: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let reviews = Self::client(&config, config.review_timeout, false)?;
        let tracks = Self::client(&config, config.stream_timeout, false)?;
        Ok(Self {
            reviews,
            tracks,
            config,
        })
    }

    fn client(config: &FetcherConfig, timeout: Duration, cookies: bool) -> Result<Client, FetchError> {
        Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_store(cookies)
            .gzip(true)
            .build()
            .map_err(FetchError::from)
    }

    async fn read_document(&self, response: Response) -> Result<String, FetchError> {
        let status = response.status();
        if !status.is_success() {
            warn!(target: "reviewer_fetch", %status, url = %response.url(), "remote request failed");
            return Err(FetchError::Status(status));
        }
        read_bounded(response, self.config.max_document_bytes).await
    }

    async fn get(&self, client: &Client, url: &str) -> Result<String, FetchError> {
        debug!(target: "reviewer_fetch", url, "GET");
        let response = client.get(url).send().await?;
        self.read_document(response).await
    }

    async fn find(
        &self,
        page: String,
        what: &'static str,
        finder: fn(&str) -> Option<String>,
    ) -> Result<String, FetchError> {
        let found = bounded(Arc::from(page), self.config.regex_timeout, move |doc| {
            finder(doc).ok_or(ExtractError::NoMatch)
        })
        .await;
        found.map_err(|_| FetchError::MissingStructure(what))
    }

    /// Token page, then search POST, then (for a results list) the first hit.
    /// Runs on its own cookie jar so concurrent searches do not share a session.
    async fn search_track(&self, terms: &str) -> Result<String, FetchError> {
        let base = self.config.stream_base_url.trim_end_matches('/');
        let session = Self::client(&self.config, self.config.stream_timeout, true)?;

        let landing = self.get(&session, &format!("{base}/")).await?;
        let token = self.find(landing, "csrf token", find_csrf_token).await?;

        debug!(target: "reviewer_fetch", url = %format!("{base}/search"), "POST");
        let response = session
            .post(format!("{base}/search"))
            .form(&[("_token", token.as_str()), ("query", terms)])
            .send()
            .await?;
        let page = self.read_document(response).await?;

        if !page.contains(SEARCH_RESULTS_MARKER) {
            return Ok(page);
        }

        let link = self.find(page, "search result link", find_first_result).await?;
        self.get(&session, &format!("{base}{link}")).await
    }
}

#[async_trait]
impl DocumentSource for HttpFetcher {
    #[instrument(name = "reviewer_fetch.reviews_page", skip(self))]
    async fn reviews_page(&self, title_id: &str) -> Result<String, FetchError> {
        let base = self.config.review_base_url.trim_end_matches('/');
        self.get(&self.reviews, &format!("{base}/title/{title_id}/reviews"))
            .await
    }

    #[instrument(name = "reviewer_fetch.track_page", skip_all, fields(external_id = ?query.external_id()))]
    async fn track_page(&self, query: &TrackQuery) -> Result<String, FetchError> {
        if let Some(external) = query.external_id() {
            let base = self.config.stream_base_url.trim_end_matches('/');
            return self.get(&self.tracks, &format!("{base}/track/{external}")).await;
        }
        let terms = query
            .search_terms()
            .ok_or(FetchError::MissingStructure("search terms"))?;
        self.search_track(&terms).await
    }
}

/// Reads the body, refusing anything past `limit`. A declared length over the
/// limit is rejected before any body bytes are read.
pub async fn read_bounded(mut response: Response, limit: u64) -> Result<String, FetchError> {
    if let Some(declared) = response.content_length() {
        if declared > limit {
            warn!(target: "reviewer_fetch", declared, limit, "declared body too large");
            return Err(FetchError::TooLarge {
                limit,
                declared: Some(declared),
            });
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if (body.len() + chunk.len()) as u64 > limit {
            warn!(target: "reviewer_fetch", limit, "streamed body too large");
            return Err(FetchError::TooLarge {
                limit,
                declared: None,
            });
        }
        body.extend_from_slice(&chunk);
    }

    debug!(target: "reviewer_fetch", bytes = body.len(), "document received");
    Ok(String::from_utf8_lossy(&body).into_owned())
}

pub fn find_csrf_token(page: &str) -> Option<String> {
    CSRF_TOKEN_RE
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn find_first_result(page: &str) -> Option<String> {
    let start = page.find(SEARCH_RESULTS_MARKER)?;
    FIRST_RESULT_RE
        .captures(&page[start..])
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
