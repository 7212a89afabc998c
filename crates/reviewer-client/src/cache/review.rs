use std::{collections::HashMap, path::Path};

use time::Duration;
use tracing::debug;

use super::{stats::CacheStats, store::JsonFileStore};
use crate::types::{CacheEntry, ReviewRecord, ReviewSet};

pub const REVIEW_CACHE_FILE: &str = "review-cache.json";
pub const DEFAULT_REVIEW_FRESHNESS: Duration = Duration::days(30);

pub type ReviewMap = HashMap<String, CacheEntry<ReviewSet>>;

/// Reviews keyed by title identifier.
///
/// `freshness` of `None` keeps entries indefinitely; review text does not
/// change once written.
#[derive(Debug)]
pub struct ReviewCache {
    store: JsonFileStore<ReviewMap>,
    freshness: Option<Duration>,
}

impl ReviewCache {
    pub async fn open(data_dir: &Path, freshness: Option<Duration>) -> Self {
        let store = JsonFileStore::open(data_dir.join(REVIEW_CACHE_FILE)).await;
        let cache = Self { store, freshness };
        let count = cache.store.lock().await.len();
        cache.store.stats().set_entry_count(count);
        cache
    }

    /// Returns the cached reviews, pruning the entry when it has no review
    /// text left or has aged past the freshness horizon. Blank records inside
    /// an otherwise valid entry are dropped from the returned value.
    pub async fn get(&self, title_id: &str) -> Option<ReviewSet> {
        let mut state = self.store.lock().await;

        let Some(entry) = state.get(title_id) else {
            self.store.stats().record_miss();
            return None;
        };

        let stale = self.is_stale(entry);
        let mut reviews = entry.value.clone();
        reviews.retain_valid();

        if stale || reviews.is_empty() {
            state.remove(title_id);
            debug!(target: "reviewer_cache", title_id, stale, "pruned review entry");
            self.store.stats().record_prune();
            self.store.stats().record_miss();
            self.store.stats().set_entry_count(state.len());
            return None;
        }

        self.store.stats().record_hit();
        Some(reviews)
    }

    /// Replaces whatever was stored for `title_id` and saves the whole file.
    pub async fn set(&self, title_id: &str, reviews: ReviewSet) {
        let mut state = self.store.lock().await;
        state.insert(title_id.to_string(), CacheEntry::new(reviews));
        self.store.stats().set_entry_count(state.len());
        self.store.save(&state).await;
    }

    /// Drops every stale or textless entry and saves, returning how many went.
    pub async fn sweep(&self) -> usize {
        let mut state = self.store.lock().await;
        let before = state.len();
        state.retain(|_, entry| {
            !self.is_stale(entry) && entry.value.records().iter().any(ReviewRecord::is_valid)
        });
        let removed = before - state.len();
        self.store.stats().record_prunes(removed);
        self.store.stats().set_entry_count(state.len());
        self.store.save(&state).await;
        debug!(target: "reviewer_cache", removed, "swept review cache");
        removed
    }

    fn is_stale(&self, entry: &CacheEntry<ReviewSet>) -> bool {
        self.freshness.is_some_and(|horizon| entry.age() >= horizon)
    }

    /// Persists pending prunes without a new entry.
    pub async fn flush(&self) {
        let state = self.store.lock().await;
        self.store.save(&state).await;
    }

    pub fn stats(&self) -> &CacheStats {
        self.store.stats()
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
