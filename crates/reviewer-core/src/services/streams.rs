use std::{sync::Arc, time::Duration};

use reviewer_client::{
    extract::{bounded, extract_stream_count, StreamFallbacks},
    validate::is_valid_track_query,
    DocumentSource, StreamCount, StreamCountCache, TrackQuery,
};
use tracing::{debug, info, instrument, warn};

use crate::error::LookupError;

/// Stream-count lookups keyed by container and item.
pub struct StreamCountService {
    cache: StreamCountCache,
    source: Arc<dyn DocumentSource>,
    extraction_timeout: Duration,
}

impl StreamCountService {
    pub fn new(
        cache: StreamCountCache,
        source: Arc<dyn DocumentSource>,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            extraction_timeout,
        }
    }

    pub fn cache(&self) -> &StreamCountCache {
        &self.cache
    }

    /// `count|||title|||artist|||releaseDate`, or `None` for any failure.
    pub async fn get_stream_count(&self, query: &TrackQuery) -> Option<String> {
        match self.lookup(query).await {
            Ok(count) => Some(count.to_wire()),
            Err(error) => {
                debug!(target: "reviewer_core", %error, "stream count not found");
                None
            }
        }
    }

    #[instrument(
        name = "reviewer_core.lookup_stream_count",
        skip_all,
        fields(container = %query.container_key(), has_external_id = query.external_id().is_some())
    )]
    pub async fn lookup(&self, query: &TrackQuery) -> Result<StreamCount, LookupError> {
        if !is_valid_track_query(query) {
            return Err(LookupError::InvalidIdentifier);
        }
        let container = query.container_key();
        let item = query.item_key().ok_or(LookupError::InvalidIdentifier)?;

        if let Some(count) = self.cache.get(&container, &item).await {
            debug!(target: "reviewer_core", %container, %item, "stream count cache hit");
            return Ok(count);
        }

        let page = self.source.track_page(query).await.map_err(|error| {
            warn!(target: "reviewer_core", %container, %item, %error, "track fetch failed");
            error
        })?;

        let fallbacks = StreamFallbacks {
            title: query.name().map(str::to_string),
            artist: query.artist().map(str::to_string),
        };
        let count = bounded(Arc::from(page), self.extraction_timeout, move |doc| {
            extract_stream_count(doc, &fallbacks)
        })
        .await
        .map_err(|error| {
            warn!(target: "reviewer_core", %container, %item, %error, "stream count extraction failed");
            error
        })?;

        self.cache.set(&container, &item, count.clone()).await;
        info!(target: "reviewer_core", %container, %item, "stream count extracted");
        Ok(count)
    }
}
