//! Review extraction cascade for title review pages.
//!
//! 1. Inline script data: a `"reviews": [...]` array whose text, author and
//!    rating fields are matched by three independent passes and zipped by
//!    index. When the passes disagree on count, later records pair with the
//!    wrong author or rating; that positional pairing is kept as-is.
//! 2. Rendered markup: the longest `<div>` under the first marker variant
//!    that matches at all, tag-stripped, with a display-name author.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{
    text::{normalize_author, normalize_content, strip_tags},
    ExtractError,
};
use crate::types::{ReviewRecord, ReviewSet, ANONYMOUS_AUTHOR};

/// Upper bound on records taken from the inline review array.
pub const MAX_REVIEWS: usize = 7;
/// Markup-derived text shorter than this is navigation, not a review.
pub const MIN_REVIEW_CHARS: usize = 50;

#[allow(clippy::expect_used)]
static REVIEWS_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"reviews"\s*:\s*\[(.*?)\]"#).expect("reviews array regex"));

#[allow(clippy::expect_used)]
static REVIEW_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"reviewText"\s*:\s*"([^"]{50,}[^"]*)""#).expect("review text regex")
});

#[allow(clippy::expect_used)]
static REVIEW_AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"author"\s*:\s*\{[^}]*"username"\s*:\s*\{[^}]*"text"\s*:\s*"([^"]+)""#)
        .expect("review author regex")
});

#[allow(clippy::expect_used)]
static REVIEW_RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"authorRating"\s*:\s*([0-9]+)"#).expect("review rating regex"));

// Marker variants in priority order; the first one with any match wins.
#[allow(clippy::expect_used)]
static MARKER_RES: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?si)<div[^>]*reviewText[^>]*>(.*?)</div>").expect("review div regex"),
        Regex::new(r#"(?si)<div[^>]*class="[^"]*content[^"]*"[^>]*>(.*?)</div>"#)
            .expect("content div regex"),
        Regex::new(r#"(?s)<div class="text show-more__control"[^>]*>(.*?)</div>"#)
            .expect("show-more div regex"),
    ]
});

#[allow(clippy::expect_used)]
static DISPLAY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="display-name-link"><a[^>]*>(.*?)</a>"#).expect("display name regex")
});

fn captures<'a>(re: &Regex, haystack: &'a str) -> Vec<&'a str> {
    re.captures_iter(haystack)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Runs the full cascade over a reviews page.
pub fn extract_reviews(document: &str) -> Result<ReviewSet, ExtractError> {
    if let Some(set) = from_inline_array(document) {
        return Ok(set);
    }
    debug!(target: "reviewer_extract", "no inline review array, trying markup patterns");
    from_markup(document)
}

fn from_inline_array(document: &str) -> Option<ReviewSet> {
    let block = REVIEWS_ARRAY_RE.captures(document)?.get(1)?.as_str();

    let texts = captures(&REVIEW_TEXT_RE, block);
    let authors = captures(&REVIEW_AUTHOR_RE, block);
    let ratings = captures(&REVIEW_RATING_RE, block);
    debug!(
        target: "reviewer_extract",
        texts = texts.len(),
        authors = authors.len(),
        ratings = ratings.len(),
        "inline review array located"
    );

    let records: Vec<ReviewRecord> = texts
        .iter()
        .take(MAX_REVIEWS)
        .enumerate()
        .map(|(index, raw_text)| {
            let author = authors
                .get(index)
                .map(|raw| normalize_author(raw))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());
            let rating = ratings.get(index).map_or_else(String::new, ToString::to_string);
            ReviewRecord::new(author, rating, normalize_content(raw_text))
        })
        .collect();

    if records.is_empty() {
        None
    } else {
        Some(ReviewSet::from(records))
    }
}

fn from_markup(document: &str) -> Result<ReviewSet, ExtractError> {
    let matches = MARKER_RES
        .iter()
        .map(|re| captures(re, document))
        .find(|found| !found.is_empty())
        .ok_or(ExtractError::NoMatch)?;

    // Ties keep the earliest match.
    let best = matches
        .iter()
        .rev()
        .max_by_key(|raw| raw.len())
        .ok_or(ExtractError::NoMatch)?;

    let content = normalize_content(&strip_tags(best));
    let length = content.chars().count();
    if length < MIN_REVIEW_CHARS {
        debug!(target: "reviewer_extract", length, "markup review too short");
        return Err(ExtractError::TooShort { length });
    }

    let author = DISPLAY_NAME_RE
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_author(m.as_str()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());

    Ok(ReviewSet::from(vec![ReviewRecord::new(author, "", content)]))
}
