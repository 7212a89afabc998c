//! Scraping client for title reviews and track stream counts.
//!
//! Layers, bottom-up: identifier [`validate`]ion, bounded [`fetch`]ing,
//! time-boxed pattern [`extract`]ion and the JSON-file [`cache`]s.

pub mod cache;
pub mod extract;
pub mod fetch;
pub mod types;
pub mod validate;

use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::warn;

pub use cache::{CombinedCacheStats, ReviewCache, StreamCountCache};
pub use extract::{ExtractError, DEFAULT_EXTRACTION_TIMEOUT};
pub use fetch::{DocumentSource, FetchError, FetcherConfig, HttpFetcher};
pub use types::{ReviewRecord, ReviewSet, StreamCount, TrackQuery};

/// Platform data directory for the cache files, or `./.reviewer` when the
/// platform has no home directory to resolve against.
pub fn default_data_dir() -> PathBuf {
    match ProjectDirs::from("com", "Reviewer", "reviewer") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => {
            warn!(target: "reviewer_cache", "unable to resolve project directories, using ./.reviewer");
            PathBuf::from(".reviewer")
        }
    }
}
