//! Stream-count extraction for track pages.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{
    text::{normalize_author, strip_tags},
    ExtractError,
};
use crate::types::StreamCount;

#[allow(clippy::expect_used)]
static COUNT_PRIMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)class="[^"]*stream-count[^"]*"[^>]*>\s*([0-9][0-9,]*)\s*<"#)
        .expect("stream count regex")
});

#[allow(clippy::expect_used)]
static COUNT_FALLBACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)total\s+streams[^0-9]{0,40}([0-9][0-9,]*)").expect("total streams regex")
});

#[allow(clippy::expect_used)]
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>").expect("title regex"));

#[allow(clippy::expect_used)]
static ARTIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)class="[^"]*\bartist[^"]*"[^>]*>(.*?)</"#).expect("artist regex")
});

#[allow(clippy::expect_used)]
static RELEASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:release\s+date|released)[^0-9A-Za-z]{0,40}(?:<[^>]*>\s*)*([0-9]{4}-[0-9]{2}-[0-9]{2}|[A-Z][a-z]{2,8}\.? [0-9]{1,2}, [0-9]{4})",
    )
    .expect("release date regex")
});

/// Caller-supplied values used when the page lacks its own.
#[derive(Debug, Clone, Default)]
pub struct StreamFallbacks {
    pub title: Option<String>,
    pub artist: Option<String>,
}

fn first_text(re: &Regex, document: &str) -> Option<String> {
    re.captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_author(&strip_tags(m.as_str())))
        .filter(|value| !value.is_empty())
}

/// Locates the play count, then title, artist and release date independently.
pub fn extract_stream_count(
    document: &str,
    fallbacks: &StreamFallbacks,
) -> Result<StreamCount, ExtractError> {
    let stream_count = COUNT_PRIMARY_RE
        .captures(document)
        .or_else(|| {
            debug!(target: "reviewer_extract", "primary count pattern missed, trying label");
            COUNT_FALLBACK_RE.captures(document)
        })
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(',').to_string())
        .ok_or(ExtractError::NoMatch)?;

    let title = first_text(&TITLE_RE, document)
        .or_else(|| fallbacks.title.clone())
        .unwrap_or_default();
    let artist = first_text(&ARTIST_RE, document)
        .or_else(|| fallbacks.artist.clone())
        .unwrap_or_default();
    let release_date = RELEASE_RE
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Ok(StreamCount {
        stream_count,
        title,
        artist,
        release_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK_PAGE: &str = r#"
        <main>
          <h1 class="track-title">Midnight &amp; Rain</h1>
          <a class="track-artist" href="/artist/9">The Examples</a>
          <div class="stat stream-count" title="streams">
            1,234,567
          </div>
          <p>Release date: <span>2021-03-05</span></p>
        </main>"#;

    #[test]
    fn extracts_all_fields_from_track_page() {
        let result = extract_stream_count(TRACK_PAGE, &StreamFallbacks::default()).unwrap();
        assert_eq!(
            result,
            StreamCount {
                stream_count: "1,234,567".into(),
                title: "Midnight & Rain".into(),
                artist: "The Examples".into(),
                release_date: "2021-03-05".into(),
            }
        );
    }

    #[test]
    fn label_fallback_and_caller_values() {
        let page = "<section><p>Total streams: <b>98,765</b></p><p>Released March 4, 2019</p></section>";
        let fallbacks = StreamFallbacks {
            title: Some("Given Title".into()),
            artist: Some("Given Artist".into()),
        };
        let result = extract_stream_count(page, &fallbacks).unwrap();
        assert_eq!(result.stream_count, "98,765");
        assert_eq!(result.title, "Given Title");
        assert_eq!(result.artist, "Given Artist");
        assert_eq!(result.release_date, "March 4, 2019");
    }

    #[test]
    fn missing_count_is_no_match() {
        let page = "<h1>Some Track</h1><p>No numbers here</p>";
        assert_eq!(
            extract_stream_count(page, &StreamFallbacks::default()),
            Err(ExtractError::NoMatch)
        );
    }

    #[test]
    fn repetitive_input_completes() {
        let page = "total streams ".repeat(50_000);
        assert!(extract_stream_count(&page, &StreamFallbacks::default()).is_err());
    }
}
