//! HTTP surface over the two lookups.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reviewer_client::{
    cache::CacheStatsSnapshot,
    validate::{is_valid_title_id, is_valid_track_query},
    TrackQuery,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::state::AppContext;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewParams {
    pub imdb_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCountParams {
    pub album_id: Option<String>,
    pub track_id: Option<String>,
    pub spotify_id: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
}

impl From<StreamCountParams> for TrackQuery {
    fn from(params: StreamCountParams) -> Self {
        TrackQuery {
            container_id: params.album_id,
            item_id: params.track_id,
            external_id: params.spotify_id,
            name: params.track_name,
            artist: params.artist_name,
        }
    }
}

/// Counters for one cache domain plus the derived hit rate.
#[derive(Debug, Serialize)]
pub struct DomainStatsReport {
    #[serde(flatten)]
    pub counters: CacheStatsSnapshot,
    pub requests: usize,
    pub hit_rate: f64,
}

impl From<CacheStatsSnapshot> for DomainStatsReport {
    fn from(counters: CacheStatsSnapshot) -> Self {
        Self {
            requests: counters.total_requests(),
            hit_rate: counters.hit_rate(),
            counters,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStatsReport {
    pub uptime_secs: i64,
    pub reviews: DomainStatsReport,
    pub stream_counts: DomainStatsReport,
}

pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/Reviewer/GetReview", get(get_review))
        .route("/Reviewer/GetStreamCount", get(get_stream_count))
        .route("/Reviewer/CacheStats", get(cache_stats))
        .with_state(context)
}

async fn get_review(
    State(context): State<Arc<AppContext>>,
    Query(params): Query<ReviewParams>,
) -> Response {
    let Some(imdb_id) = params
        .imdb_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    else {
        warn!(target: "reviewer_http", "IMDb ID is required");
        return (StatusCode::BAD_REQUEST, "IMDb ID is required").into_response();
    };
    if !is_valid_title_id(imdb_id) {
        warn!(target: "reviewer_http", imdb_id, "invalid IMDb ID format");
        return (
            StatusCode::BAD_REQUEST,
            "Invalid IMDb ID format. Expected format: tt1234567",
        )
            .into_response();
    }

    info!(target: "reviewer_http", imdb_id, "GetReview");
    match context.reviews.get_review(imdb_id).await {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => (StatusCode::NOT_FOUND, "No review found").into_response(),
    }
}

async fn get_stream_count(
    State(context): State<Arc<AppContext>>,
    Query(params): Query<StreamCountParams>,
) -> Response {
    let query = TrackQuery::from(params);
    if query.external_id().is_none() && (query.name().is_none() || query.artist().is_none()) {
        warn!(target: "reviewer_http", "insufficient identifying fields");
        return (
            StatusCode::BAD_REQUEST,
            "Either Spotify ID or both track name and artist name required",
        )
            .into_response();
    }
    if !is_valid_track_query(&query) {
        warn!(target: "reviewer_http", "invalid Spotify ID format");
        return (StatusCode::BAD_REQUEST, "Invalid Spotify ID format").into_response();
    }

    match query.external_id() {
        Some(spotify_id) => info!(target: "reviewer_http", spotify_id, "GetStreamCount"),
        None => info!(target: "reviewer_http", "GetStreamCount with track/artist names"),
    }
    match context.streams.get_stream_count(&query).await {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => (StatusCode::NOT_FOUND, "No stream data found").into_response(),
    }
}

async fn cache_stats(State(context): State<Arc<AppContext>>) -> impl IntoResponse {
    let stats = context.cache_stats();
    Json(CacheStatsReport {
        uptime_secs: context.uptime().whole_seconds(),
        reviews: stats.reviews.into(),
        stream_counts: stats.stream_counts.into(),
    })
}

/// Serves until Ctrl-C, then flushes both caches.
pub async fn serve_http(context: Arc<AppContext>, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(target: "reviewer_http", addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(context.clone()))
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(target: "reviewer_http", %error, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("HTTP server failed")?;

    info!(target: "reviewer_http", "shutting down, flushing caches");
    context.flush().await;
    Ok(())
}
