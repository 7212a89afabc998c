use std::{collections::HashMap, path::Path};

use time::Duration;
use tracing::debug;

use super::{stats::CacheStats, store::JsonFileStore};
use crate::types::{CacheEntry, StreamCount};

pub const STREAM_CACHE_FILE: &str = "stream-count-cache.json";
/// Play counts move daily; anything older than a week is refetched.
pub const DEFAULT_STREAM_FRESHNESS: Duration = Duration::days(7);

pub type TrackMap = HashMap<String, CacheEntry<StreamCount>>;
pub type ContainerMap = HashMap<String, TrackMap>;

/// Stream counts keyed by container (album) and then item (track).
#[derive(Debug)]
pub struct StreamCountCache {
    store: JsonFileStore<ContainerMap>,
    freshness: Duration,
}

fn track_total(state: &ContainerMap) -> usize {
    state.values().map(HashMap::len).sum()
}

impl StreamCountCache {
    pub async fn open(data_dir: &Path, freshness: Duration) -> Self {
        let store = JsonFileStore::open(data_dir.join(STREAM_CACHE_FILE)).await;
        let cache = Self { store, freshness };
        let count = track_total(&*cache.store.lock().await);
        cache.store.stats().set_entry_count(count);
        cache
    }

    /// Returns a fresh, non-empty count. Empty or expired entries are removed
    /// on the spot; the removal reaches disk with the next save.
    pub async fn get(&self, container: &str, item: &str) -> Option<StreamCount> {
        let mut state = self.store.lock().await;

        let Some(tracks) = state.get_mut(container) else {
            self.store.stats().record_miss();
            return None;
        };
        let Some(entry) = tracks.get(item) else {
            self.store.stats().record_miss();
            return None;
        };

        let expired = self.is_expired(entry);
        if expired || !entry.value.is_valid() {
            let value = entry.value.stream_count.clone();
            tracks.remove(item);
            if tracks.is_empty() {
                state.remove(container);
            }
            debug!(
                target: "reviewer_cache",
                container,
                item,
                expired,
                empty = value.trim().is_empty(),
                "pruned stream count entry"
            );
            self.store.stats().record_prune();
            self.store.stats().record_miss();
            self.store.stats().set_entry_count(track_total(&state));
            return None;
        }

        self.store.stats().record_hit();
        Some(entry.value.clone())
    }

    /// Stores `value` under `container`/`item`, replacing any previous entry
    /// for that item only, and saves the whole file.
    pub async fn set(&self, container: &str, item: &str, value: StreamCount) {
        if !value.is_valid() {
            debug!(target: "reviewer_cache", container, item, "refusing to cache empty stream count");
            return;
        }
        let mut state = self.store.lock().await;
        state
            .entry(container.to_string())
            .or_default()
            .insert(item.to_string(), CacheEntry::new(value));
        self.store.stats().set_entry_count(track_total(&state));
        self.store.save(&state).await;
    }

    /// Drops every expired or empty entry and saves, returning how many went.
    pub async fn sweep(&self) -> usize {
        let mut state = self.store.lock().await;
        let before = track_total(&state);
        for tracks in state.values_mut() {
            tracks.retain(|_, entry| !self.is_expired(entry) && entry.value.is_valid());
        }
        state.retain(|_, tracks| !tracks.is_empty());
        let remaining = track_total(&state);
        let removed = before - remaining;
        self.store.stats().record_prunes(removed);
        self.store.stats().set_entry_count(remaining);
        self.store.save(&state).await;
        debug!(target: "reviewer_cache", removed, "swept stream count cache");
        removed
    }

    fn is_expired(&self, entry: &CacheEntry<StreamCount>) -> bool {
        entry.age() > self.freshness
    }

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

    /// Number of cached items across all containers.
    pub async fn len(&self) -> usize {
        track_total(&*self.store.lock().await)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
