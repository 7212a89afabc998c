use reviewer_client::{ExtractError, FetchError};
use thiserror::Error;

/// Why a lookup produced no value. Callers of the `Option` lookups see all
/// of these as "not found".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("identifier is missing or malformed")]
    InvalidIdentifier,
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
}
