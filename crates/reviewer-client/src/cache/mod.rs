pub mod review;
pub mod stats;
pub mod store;
pub mod stream;

pub use review::{ReviewCache, DEFAULT_REVIEW_FRESHNESS, REVIEW_CACHE_FILE};
pub use stats::{CacheStats, CacheStatsSnapshot, CombinedCacheStats};
pub use store::JsonFileStore;
pub use stream::{StreamCountCache, DEFAULT_STREAM_FRESHNESS, STREAM_CACHE_FILE};
