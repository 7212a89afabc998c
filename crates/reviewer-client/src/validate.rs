//! Identifier guards evaluated before any cache or network access.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::TrackQuery;

// Two-letter prefix followed by seven or eight digits, e.g. `tt1234567`.
#[allow(clippy::expect_used)]
static TITLE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tt[0-9]{7,8}$").expect("title id regex"));

#[allow(clippy::expect_used)]
static TRACK_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]{22}$").expect("track id regex"));

/// Returns `true` when `id` is a well-formed title identifier.
pub fn is_valid_title_id(id: &str) -> bool {
    TITLE_ID_RE.is_match(id)
}

/// Returns `true` when `id` is a well-formed external track identifier.
pub fn is_valid_track_id(id: &str) -> bool {
    TRACK_ID_RE.is_match(id)
}

/// A stream-count query needs either a well-formed external ID or both a
/// name and an artist to search for.
pub fn is_valid_track_query(query: &TrackQuery) -> bool {
    match query.external_id() {
        Some(external) => is_valid_track_id(external),
        None => query.name().is_some() && query.artist().is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_seven_and_eight_digit_ids() {
        assert!(is_valid_title_id("tt1234567"));
        assert!(is_valid_title_id("tt12345678"));
    }

    #[test]
    fn rejects_malformed_title_ids() {
        for id in [
            "",
            "tt123456",
            "tt123456789",
            "nm1234567",
            "TT1234567",
            "tt12345a7",
            " tt1234567",
            "tt1234567\n",
            "tt١٢٣٤٥٦٧",
            "tt１２３４５６７",
        ] {
            assert!(!is_valid_title_id(id), "{id:?} should be rejected");
        }
    }

    #[test]
    fn track_query_requires_id_or_name_and_artist() {
        let by_id = TrackQuery {
            external_id: Some("4uLU6hMCjMI75M1A2tKUQC".into()),
            ..TrackQuery::default()
        };
        assert!(is_valid_track_query(&by_id));

        let bad_id = TrackQuery {
            external_id: Some("not-an-id".into()),
            name: Some("Song".into()),
            artist: Some("Band".into()),
            ..TrackQuery::default()
        };
        assert!(!is_valid_track_query(&bad_id));

        let by_name = TrackQuery {
            name: Some("Song".into()),
            artist: Some("Band".into()),
            ..TrackQuery::default()
        };
        assert!(is_valid_track_query(&by_name));

        let name_only = TrackQuery {
            name: Some("Song".into()),
            ..TrackQuery::default()
        };
        assert!(!is_valid_track_query(&name_only));
    }
}
