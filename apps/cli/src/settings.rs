use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use reviewer_core::ServerConfig;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "REVIEWER";

/// Overrides read from an optional settings file and `REVIEWER_*` variables.
/// Unset fields keep the runtime defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub bind: Option<SocketAddr>,
    pub review_base_url: Option<String>,
    pub stream_base_url: Option<String>,
    pub review_timeout_secs: Option<u64>,
    pub stream_timeout_secs: Option<u64>,
    pub max_document_bytes: Option<u64>,
    pub regex_timeout_ms: Option<u64>,
    /// `0` keeps reviews until replaced.
    pub review_freshness_days: Option<i64>,
    pub stream_freshness_days: Option<i64>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to load settings")?
            .try_deserialize()
            .context("invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (key, days) in [
            ("review_freshness_days", self.review_freshness_days),
            ("stream_freshness_days", self.stream_freshness_days),
        ] {
            if let Some(days) = days {
                ensure!(days >= 0, "{key} must not be negative (got {days})");
            }
        }
        Ok(())
    }

    pub fn apply(self, config: &mut ServerConfig) {
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(url) = self.review_base_url {
            config.review_base_url = url;
        }
        if let Some(url) = self.stream_base_url {
            config.stream_base_url = url;
        }
        if let Some(secs) = self.review_timeout_secs {
            config.review_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.stream_timeout_secs {
            config.stream_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = self.max_document_bytes {
            config.max_document_bytes = bytes;
        }
        if let Some(ms) = self.regex_timeout_ms {
            config.regex_timeout = Duration::from_millis(ms);
        }
        if let Some(days) = self.review_freshness_days {
            config.review_freshness = (days > 0).then(|| time::Duration::days(days));
        }
        if let Some(days) = self.stream_freshness_days {
            config.stream_freshness = time::Duration::days(days);
        }
    }
}
