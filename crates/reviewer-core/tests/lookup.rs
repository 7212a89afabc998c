use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use reviewer_client::{
    cache::{stream::ContainerMap, STREAM_CACHE_FILE},
    types::CacheEntry,
    DocumentSource, ExtractError, FetchError, StreamCount, TrackQuery,
};
use reviewer_core::{state::AppContext, LookupError, ServerConfig};
use tempfile::{tempdir, TempDir};
use time::{Duration, OffsetDateTime};

const TEXT_A: &str = "An absorbing slow burn that rewards patience with a devastating final act.";
const TEXT_B: &str = "Gorgeous to look at but the script never figures out what it wants to say.";
const TEXT_C: &str = "I went in expecting very little and came out having seen my favourite film.";

fn three_review_page() -> String {
    format!(
        r#"<script>{{"props":{{"reviews":[
            {{"author":{{"username":{{"text":"alice"}}}},"authorRating":9,"reviewText":"{TEXT_A}"}},
            {{"authorRating":7,"reviewText":"{TEXT_B}"}},
            {{"author":{{"username":{{"text":"carol"}}}},"authorRating":5,"reviewText":"{TEXT_C}"}}
        ]}}}}</script>"#
    )
}

const TRACK_PAGE: &str = r#"<h1>Midnight Drive</h1><a class="artist">The Lanterns</a>
    <span class="stream-count">12,345,678</span><p>Released March 3, 2021</p>"#;

/// In-memory pages with a counter per fetch kind.
struct CountingSource {
    review: Result<String, FetchError>,
    track: Result<String, FetchError>,
    review_fetches: AtomicUsize,
    track_fetches: AtomicUsize,
}

impl CountingSource {
    fn new(review: Result<String, FetchError>, track: Result<String, FetchError>) -> Arc<Self> {
        Arc::new(Self {
            review,
            track,
            review_fetches: AtomicUsize::new(0),
            track_fetches: AtomicUsize::new(0),
        })
    }

    fn reviews(page: impl Into<String>) -> Arc<Self> {
        Self::new(Ok(page.into()), Err(FetchError::Timeout))
    }

    fn tracks(page: impl Into<String>) -> Arc<Self> {
        Self::new(Err(FetchError::Timeout), Ok(page.into()))
    }

    fn review_fetches(&self) -> usize {
        self.review_fetches.load(Ordering::SeqCst)
    }

    fn track_fetches(&self) -> usize {
        self.track_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for CountingSource {
    async fn reviews_page(&self, _title_id: &str) -> Result<String, FetchError> {
        self.review_fetches.fetch_add(1, Ordering::SeqCst);
        self.review.clone()
    }

    async fn track_page(&self, _query: &TrackQuery) -> Result<String, FetchError> {
        self.track_fetches.fetch_add(1, Ordering::SeqCst);
        self.track.clone()
    }
}

fn config_for(dir: &TempDir) -> ServerConfig {
    ServerConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..ServerConfig::default()
    }
}

fn by_names() -> TrackQuery {
    TrackQuery {
        container_id: Some("album-42".into()),
        item_id: Some("track-7".into()),
        name: Some("Midnight Drive".into()),
        artist: Some("The Lanterns".into()),
        ..TrackQuery::default()
    }
}

#[tokio::test]
async fn second_review_lookup_is_served_from_cache() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::reviews(three_review_page());
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    let first = context.reviews.get_review("tt1234567").await.expect("reviews");
    let expected = format!("alice|||9|||{TEXT_A}@@@carol|||7|||{TEXT_B}@@@Anonymous|||5|||{TEXT_C}");
    assert_eq!(first, expected);
    assert_eq!(source.review_fetches(), 1);

    let second = context.reviews.get_review("tt1234567").await.expect("reviews");
    assert_eq!(second, first);
    assert_eq!(source.review_fetches(), 1);
}

#[tokio::test]
async fn cached_reviews_survive_a_restart() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::reviews(three_review_page());
    let first = AppContext::open(&config_for(&dir), source.clone()).await;
    let wire = first.reviews.get_review("tt1234567").await;

    let restarted = AppContext::open(&config_for(&dir), source.clone()).await;
    assert_eq!(restarted.reviews.get_review("tt1234567").await, wire);
    assert_eq!(source.review_fetches(), 1);
}

#[tokio::test]
async fn malformed_title_ids_never_fetch() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::reviews(three_review_page());
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    for id in ["", "tt123", "nm1234567", "tt123456789", " tt1234567"] {
        assert_eq!(context.reviews.get_review(id).await, None, "{id:?}");
        assert_eq!(
            context.reviews.lookup(id).await,
            Err(LookupError::InvalidIdentifier)
        );
    }
    assert_eq!(source.review_fetches(), 0);
}

#[tokio::test]
async fn fetch_failure_is_not_found_and_not_cached() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::new(
        Err(FetchError::TooLarge {
            limit: 1024,
            declared: Some(4096),
        }),
        Err(FetchError::Timeout),
    );
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    assert_eq!(context.reviews.get_review("tt1234567").await, None);
    assert!(matches!(
        context.reviews.lookup("tt1234567").await,
        Err(LookupError::Fetch(FetchError::TooLarge { .. }))
    ));
    assert_eq!(source.review_fetches(), 2);
    assert!(context.reviews.cache().is_empty().await);
}

#[tokio::test]
async fn unstructured_page_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::reviews("<html><body>Nothing to see</body></html>");
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    assert_eq!(
        context.reviews.lookup("tt1234567").await,
        Err(LookupError::Extract(ExtractError::NoMatch))
    );
    assert!(context.reviews.cache().is_empty().await);
}

#[tokio::test]
async fn persist_failure_still_returns_the_value() {
    let dir = tempdir().expect("tempdir");
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"x").unwrap();
    let config = ServerConfig {
        data_dir: Some(blocker),
        ..ServerConfig::default()
    };
    let source = CountingSource::reviews(three_review_page());
    let context = AppContext::open(&config, source.clone()).await;

    let wire = context.reviews.get_review("tt1234567").await;
    assert!(wire.is_some_and(|w| w.starts_with("alice|||9|||")));
    assert_eq!(context.cache_stats().reviews.write_failures, 1);
}

#[tokio::test]
async fn stream_count_round_trip_uses_item_key() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::tracks(TRACK_PAGE);
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    let first = context.streams.get_stream_count(&by_names()).await;
    assert_eq!(
        first.as_deref(),
        Some("12,345,678|||Midnight Drive|||The Lanterns|||March 3, 2021")
    );
    assert_eq!(context.streams.get_stream_count(&by_names()).await, first);
    assert_eq!(source.track_fetches(), 1);

    let raw = std::fs::read(dir.path().join(STREAM_CACHE_FILE)).unwrap();
    let persisted: ContainerMap = serde_json::from_slice(&raw).unwrap();
    assert!(persisted["album-42"].contains_key("track-7"));
}

#[tokio::test]
async fn stream_entries_expire_after_a_week() {
    let dir = tempdir().expect("tempdir");
    let seeded = |value: &str, age: Duration| CacheEntry {
        value: StreamCount {
            stream_count: value.into(),
            ..StreamCount::default()
        },
        captured_at: OffsetDateTime::now_utc() - age,
    };
    let mut map = ContainerMap::new();
    let album = map.entry("unknown".into()).or_default();
    album.insert("midnight drive::the lanterns".into(), seeded("1", Duration::days(6)));
    album.insert("4uLU6hMCjMI75M1A2tKUQC".into(), seeded("2", Duration::days(8)));
    std::fs::write(dir.path().join(STREAM_CACHE_FILE), serde_json::to_vec(&map).unwrap()).unwrap();

    let source = CountingSource::tracks(TRACK_PAGE);
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    let fresh = TrackQuery {
        name: Some("Midnight Drive".into()),
        artist: Some("The Lanterns".into()),
        ..TrackQuery::default()
    };
    assert_eq!(context.streams.get_stream_count(&fresh).await.as_deref(), Some("1|||||||||"));
    assert_eq!(source.track_fetches(), 0);

    let stale = TrackQuery {
        external_id: Some("4uLU6hMCjMI75M1A2tKUQC".into()),
        ..TrackQuery::default()
    };
    let refreshed = context.streams.lookup(&stale).await.expect("refetched");
    assert_eq!(refreshed.stream_count, "12,345,678");
    assert_eq!(source.track_fetches(), 1);
}

#[tokio::test]
async fn insufficient_track_queries_never_fetch() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::tracks(TRACK_PAGE);
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    let queries = [
        TrackQuery::default(),
        TrackQuery {
            name: Some("Midnight Drive".into()),
            ..TrackQuery::default()
        },
        TrackQuery {
            external_id: Some("not-an-id".into()),
            name: Some("Midnight Drive".into()),
            artist: Some("The Lanterns".into()),
            ..TrackQuery::default()
        },
    ];
    for query in &queries {
        assert_eq!(context.streams.lookup(query).await, Err(LookupError::InvalidIdentifier));
    }
    assert_eq!(source.track_fetches(), 0);
}

#[tokio::test]
async fn page_without_a_count_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let source = CountingSource::tracks("<h1>Midnight Drive</h1>");
    let context = AppContext::open(&config_for(&dir), source.clone()).await;

    assert_eq!(context.streams.get_stream_count(&by_names()).await, None);
    assert!(context.streams.cache().is_empty().await);
}
