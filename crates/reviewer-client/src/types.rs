use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Separator between the fields of a single record on the wire.
pub const FIELD_SEPARATOR: &str = "|||";
/// Separator between records on the wire.
pub const RECORD_SEPARATOR: &str = "@@@";

/// Author used when a review carries no recognisable author name.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A persisted value together with the moment it was captured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            captured_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn age(&self) -> time::Duration {
        OffsetDateTime::now_utc() - self.captured_at
    }
}

/// One review extracted from a reviews page, fully decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub author: String,
    #[serde(default)]
    pub rating: String,
    pub content: String,
}

impl ReviewRecord {
    pub fn new(
        author: impl Into<String>,
        rating: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            rating: rating.into(),
            content: content.into(),
        }
    }

    /// A record counts towards a cache hit only when it carries review text.
    pub fn is_valid(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn to_wire(&self) -> String {
        [self.author.as_str(), self.rating.as_str(), self.content.as_str()].join(FIELD_SEPARATOR)
    }
}

/// Ordered set of reviews for a single title.
///
/// Kept as a sequence rather than a map keyed by author so that two reviews
/// from the same (or the default anonymous) author survive a cache round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ReviewSet(pub Vec<ReviewRecord>);

impl ReviewSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.0
    }

    /// Drops records without content, returning how many were removed.
    pub fn retain_valid(&mut self) -> usize {
        let before = self.0.len();
        self.0.retain(ReviewRecord::is_valid);
        before - self.0.len()
    }

    /// Field values are joined verbatim: a value that itself contains a
    /// separator token is not escaped and will confuse downstream parsing.
    pub fn to_wire(&self) -> String {
        self.0
            .iter()
            .map(ReviewRecord::to_wire)
            .collect::<Vec<_>>()
            .join(RECORD_SEPARATOR)
    }
}

impl From<Vec<ReviewRecord>> for ReviewSet {
    fn from(records: Vec<ReviewRecord>) -> Self {
        Self(records)
    }
}

/// Play-count statistic plus the descriptive fields found next to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamCount {
    #[serde(rename = "streamCountText")]
    pub stream_count: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub release_date: String,
}

impl StreamCount {
    pub fn is_valid(&self) -> bool {
        !self.stream_count.trim().is_empty()
    }

    pub fn to_wire(&self) -> String {
        [
            self.stream_count.as_str(),
            self.title.as_str(),
            self.artist.as_str(),
            self.release_date.as_str(),
        ]
        .join(FIELD_SEPARATOR)
    }
}

/// Loosely-typed identifying fields for a stream-count lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackQuery {
    pub container_id: Option<String>,
    pub item_id: Option<String>,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
}

/// Placeholder outer key when a lookup carries no container identifier.
pub const UNKNOWN_CONTAINER: &str = "unknown";

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl TrackQuery {
    pub fn external_id(&self) -> Option<&str> {
        present(self.external_id.as_ref())
    }

    pub fn name(&self) -> Option<&str> {
        present(self.name.as_ref())
    }

    pub fn artist(&self) -> Option<&str> {
        present(self.artist.as_ref())
    }

    /// Outer cache key: the container identifier or [`UNKNOWN_CONTAINER`].
    pub fn container_key(&self) -> String {
        present(self.container_id.as_ref())
            .unwrap_or(UNKNOWN_CONTAINER)
            .to_string()
    }

    /// Inner cache key: item ID, then external ID, then `name::artist`.
    pub fn item_key(&self) -> Option<String> {
        if let Some(item) = present(self.item_id.as_ref()) {
            return Some(item.to_string());
        }
        if let Some(external) = self.external_id() {
            return Some(external.to_string());
        }
        match (self.name(), self.artist()) {
            (Some(name), Some(artist)) => Some(format!(
                "{}::{}",
                name.to_lowercase(),
                artist.to_lowercase()
            )),
            _ => None,
        }
    }

    /// Free-text query submitted to the search form.
    pub fn search_terms(&self) -> Option<String> {
        match (self.name(), self.artist()) {
            (Some(name), Some(artist)) => Some(format!("{name} {artist}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_set_joins_with_separators() {
        let set = ReviewSet::from(vec![
            ReviewRecord::new("alice", "9", "Great film."),
            ReviewRecord::new(ANONYMOUS_AUTHOR, "", "Not for me."),
        ]);
        assert_eq!(
            set.to_wire(),
            "alice|||9|||Great film.@@@Anonymous||||||Not for me."
        );
    }

    #[test]
    fn retain_valid_drops_blank_content() {
        let mut set = ReviewSet::from(vec![
            ReviewRecord::new("alice", "9", "  "),
            ReviewRecord::new("bob", "7", "Solid."),
        ]);
        assert_eq!(set.retain_valid(), 1);
        assert_eq!(set.len(), 1);
        assert_eq!(set.records()[0].author, "bob");
    }

    #[test]
    fn item_key_prefers_stable_identifiers() {
        let mut query = TrackQuery {
            container_id: None,
            item_id: None,
            external_id: None,
            name: Some("Song".into()),
            artist: Some("Band".into()),
        };
        assert_eq!(query.container_key(), UNKNOWN_CONTAINER);
        assert_eq!(query.item_key().as_deref(), Some("song::band"));

        query.external_id = Some("4uLU6hMCjMI75M1A2tKUQC".into());
        assert_eq!(query.item_key().as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));

        query.item_id = Some("track-1".into());
        assert_eq!(query.item_key().as_deref(), Some("track-1"));
    }

    #[test]
    fn blank_fields_are_treated_as_absent() {
        let query = TrackQuery {
            container_id: Some("  ".into()),
            name: Some("Song".into()),
            artist: Some(String::new()),
            ..TrackQuery::default()
        };
        assert_eq!(query.container_key(), UNKNOWN_CONTAINER);
        assert!(query.item_key().is_none());
        assert!(query.search_terms().is_none());
    }

    #[test]
    fn cache_entry_serializes_camel_case_timestamp() {
        let entry = CacheEntry::new(StreamCount {
            stream_count: "1,000".into(),
            ..StreamCount::default()
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json["capturedAt"].is_string());
        assert_eq!(json["value"]["streamCountText"], "1,000");
    }
}
