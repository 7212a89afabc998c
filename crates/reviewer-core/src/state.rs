use std::sync::Arc;

use reviewer_client::{CombinedCacheStats, DocumentSource, ReviewCache, StreamCountCache};
use time::OffsetDateTime;

use crate::{
    services::{ReviewService, StreamCountService},
    ServerConfig,
};

/// Everything a request handler needs, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppContext {
    pub reviews: Arc<ReviewService>,
    pub streams: Arc<StreamCountService>,
    pub started_at: OffsetDateTime,
}

impl AppContext {
    /// Loads both cache files from the configured data directory and wires
    /// them to `source`.
    pub async fn open(config: &ServerConfig, source: Arc<dyn DocumentSource>) -> Self {
        let data_dir = config.resolved_data_dir();
        let review_cache = ReviewCache::open(&data_dir, config.review_freshness).await;
        let stream_cache = StreamCountCache::open(&data_dir, config.stream_freshness).await;

        Self {
            reviews: Arc::new(ReviewService::new(
                review_cache,
                source.clone(),
                config.regex_timeout,
            )),
            streams: Arc::new(StreamCountService::new(
                stream_cache,
                source,
                config.regex_timeout,
            )),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn cache_stats(&self) -> CombinedCacheStats {
        CombinedCacheStats {
            reviews: self.reviews.cache().stats().snapshot(),
            stream_counts: self.streams.cache().stats().snapshot(),
        }
    }

    pub fn uptime(&self) -> time::Duration {
        OffsetDateTime::now_utc() - self.started_at
    }

    /// Prunes expired and empty entries from both caches, returning the
    /// number removed from each (reviews, stream counts).
    pub async fn sweep(&self) -> (usize, usize) {
        let reviews = self.reviews.cache().sweep().await;
        let streams = self.streams.cache().sweep().await;
        (reviews, streams)
    }

    /// Writes both caches, persisting any read-time prunes.
    pub async fn flush(&self) {
        self.reviews.cache().flush().await;
        self.streams.cache().flush().await;
    }
}
