use std::{sync::Arc, time::Duration};

use reviewer_client::{
    extract::{bounded, extract_reviews},
    validate::is_valid_title_id,
    DocumentSource, ExtractError, ReviewCache, ReviewSet,
};
use tracing::{debug, info, instrument, warn};

use crate::error::LookupError;

/// Review lookups: validate, cache, fetch, extract, store.
pub struct ReviewService {
    cache: ReviewCache,
    source: Arc<dyn DocumentSource>,
    extraction_timeout: Duration,
}

impl ReviewService {
    pub fn new(cache: ReviewCache, source: Arc<dyn DocumentSource>, extraction_timeout: Duration) -> Self {
        Self {
            cache,
            source,
            extraction_timeout,
        }
    }

    pub fn cache(&self) -> &ReviewCache {
        &self.cache
    }

    /// Wire-format reviews for `imdb_id`, or `None` for any failure.
    pub async fn get_review(&self, imdb_id: &str) -> Option<String> {
        match self.lookup(imdb_id).await {
            Ok(reviews) => Some(reviews.to_wire()),
            Err(error) => {
                debug!(target: "reviewer_core", imdb_id, %error, "review not found");
                None
            }
        }
    }

    #[instrument(name = "reviewer_core.lookup_review", skip(self))]
    pub async fn lookup(&self, imdb_id: &str) -> Result<ReviewSet, LookupError> {
        if !is_valid_title_id(imdb_id) {
            return Err(LookupError::InvalidIdentifier);
        }

        if let Some(reviews) = self.cache.get(imdb_id).await {
            debug!(target: "reviewer_core", imdb_id, count = reviews.len(), "review cache hit");
            return Ok(reviews);
        }

        let page = self.source.reviews_page(imdb_id).await.map_err(|error| {
            warn!(target: "reviewer_core", imdb_id, %error, "review fetch failed");
            error
        })?;

        let reviews = bounded(Arc::from(page), self.extraction_timeout, extract_reviews)
            .await
            .map_err(|error| {
                warn!(target: "reviewer_core", imdb_id, %error, "review extraction failed");
                error
            })?;
        if reviews.is_empty() {
            return Err(ExtractError::NoMatch.into());
        }

        self.cache.set(imdb_id, reviews.clone()).await;
        info!(target: "reviewer_core", imdb_id, count = reviews.len(), "reviews extracted");
        Ok(reviews)
    }
}
