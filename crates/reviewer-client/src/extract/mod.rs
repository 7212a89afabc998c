//! Pattern-based extraction of reviews and stream counts from fetched pages.
//!
//! Extractors are pure functions of document text. [`bounded`] runs one on a
//! blocking thread under a wall-clock ceiling so a pathological document can
//! never hold the caller past that budget.

pub mod review;
pub mod stream;
pub mod text;

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{task, time::timeout};
use tracing::warn;

pub use review::extract_reviews;
pub use stream::{extract_stream_count, StreamFallbacks};

/// Default wall-clock budget for a single extraction pass.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no recognised structure in document")]
    NoMatch,
    #[error("extracted text too short ({length} chars)")]
    TooShort { length: usize },
    #[error("extraction exceeded {0:?}")]
    Timeout(Duration),
    #[error("extraction aborted: {0}")]
    Aborted(String),
}

/// Runs `extractor` against `document` on the blocking pool, giving up after
/// `limit`. A panic inside the extractor becomes [`ExtractError::Aborted`].
///
/// On timeout the blocking task is detached and finishes on its own; it owns
/// only its copy of the document, so nothing shared is left half-written.
pub async fn bounded<T, F>(document: Arc<str>, limit: Duration, extractor: F) -> Result<T, ExtractError>
where
    T: Send + 'static,
    F: FnOnce(&str) -> Result<T, ExtractError> + Send + 'static,
{
    let handle = task::spawn_blocking(move || extractor(&document));
    match timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            warn!(target: "reviewer_extract", error = %join_error, "extractor panicked");
            Err(ExtractError::Aborted(join_error.to_string()))
        }
        Err(_) => {
            warn!(target: "reviewer_extract", limit_ms = limit.as_millis(), "extraction timed out");
            Err(ExtractError::Timeout(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn returns_extractor_result() {
        let doc: Arc<str> = Arc::from("hello");
        let len = bounded(doc, Duration::from_secs(1), |d| Ok(d.len()))
            .await
            .unwrap();
        assert_eq!(len, 5);
    }

    #[tokio::test]
    async fn slow_extractor_times_out() {
        let doc: Arc<str> = Arc::from("slow");
        let started = Instant::now();
        let result = bounded(doc, Duration::from_millis(50), |_| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .await;
        assert_eq!(result, Err(ExtractError::Timeout(Duration::from_millis(50))));
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn panicking_extractor_is_contained() {
        let doc: Arc<str> = Arc::from("boom");
        let result: Result<(), _> = bounded(doc, Duration::from_secs(1), |_| panic!("bad page")).await;
        assert!(matches!(result, Err(ExtractError::Aborted(_))));
    }
}
