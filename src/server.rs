// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Content backend serving `/api/channels` and `/api/categories` from an M3U
//! playlist.
//!
//! The playlist is fetched lazily and kept for a fixed TTL. A failed fetch is
//! logged and answered with an empty list, but is not cached, so the next
//! request tries again.

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::channel::{Category, Channel};
use crate::config::ServeConfig;
use crate::m3u;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSource {
    Url(String),
    File(PathBuf),
    /// Playlist text held in memory
    Inline(String),
}

impl PlaylistSource {
    /// `http://` and `https://` locations are URLs, anything else a file path.
    pub fn from_location(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Self::Url(location.to_string())
        } else {
            Self::File(PathBuf::from(location))
        }
    }
}

pub struct PlaylistCache {
    source: PlaylistSource,
    ttl: Duration,
    client: Client,
    entry: RwLock<Option<(Instant, Arc<Vec<Channel>>)>>,
}

impl PlaylistCache {
    pub fn new(source: PlaylistSource, ttl: Duration) -> Result<Self> {
        Ok(Self {
            source,
            ttl,
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent("Mozilla/5.0")
                .build()?,
            entry: RwLock::new(None),
        })
    }

    pub async fn channels(&self) -> Arc<Vec<Channel>> {
        if let Some((fetched_at, channels)) = self.entry.read().await.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            return Arc::clone(channels);
        }

        match self.load().await {
            Ok(channels) => {
                info!("Loaded {} channels from playlist", channels.len());
                let channels = Arc::new(channels);
                *self.entry.write().await = Some((Instant::now(), Arc::clone(&channels)));
                channels
            }
            Err(e) => {
                warn!("Error fetching playlist: {:#}", e);
                Arc::new(Vec::new())
            }
        }
    }

    async fn load(&self) -> Result<Vec<Channel>> {
        let content = match &self.source {
            PlaylistSource::Url(url) => {
                debug!("Fetching playlist from {}", url);
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("Failed to send request to {}", url))?;
                if !response.status().is_success() {
                    anyhow::bail!("Playlist request failed with status: {}", response.status());
                }
                response
                    .text()
                    .await
                    .with_context(|| "Failed to read playlist body")?
            }
            PlaylistSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read playlist file: {}", path.display()))?,
            PlaylistSource::Inline(text) => text.clone(),
        };
        Ok(m3u::parse(&content))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelsQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

/// `category` must equal the group exactly; `search` matches name or group
/// case-insensitively. Empty values are ignored.
pub fn filter_channels(
    channels: &[Channel],
    category: Option<&str>,
    search: Option<&str>,
) -> Vec<Channel> {
    let category = category.filter(|c| !c.is_empty());
    let needle = search.filter(|s| !s.is_empty()).map(str::to_lowercase);

    channels
        .iter()
        .filter(|c| category.is_none_or(|cat| c.group == cat))
        .filter(|c| needle.as_deref().is_none_or(|n| c.matches_query(n)))
        .cloned()
        .collect()
}

/// Every distinct tag across all groups, sorted.
pub fn collect_categories(channels: &[Channel]) -> Vec<Category> {
    channels
        .iter()
        .flat_map(|c| c.tags())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Clone)]
pub struct ServerState {
    playlist: Arc<PlaylistCache>,
}

impl ServerState {
    pub fn new(playlist: PlaylistCache) -> Self {
        Self {
            playlist: Arc::new(playlist),
        }
    }
}

async fn list_channels(
    State(state): State<ServerState>,
    Query(query): Query<ChannelsQuery>,
) -> Json<Vec<Channel>> {
    debug!("GET /api/channels {:?}", query);
    let channels = state.playlist.channels().await;
    let filtered = filter_channels(
        &channels,
        query.category.as_deref(),
        query.search.as_deref(),
    );
    debug!("Returning {} channels", filtered.len());
    Json(filtered)
}

async fn list_categories(State(state): State<ServerState>) -> Json<Vec<Category>> {
    debug!("GET /api/categories");
    let channels = state.playlist.channels().await;
    let categories = collect_categories(&channels);
    debug!("Returning {} categories", categories.len());
    Json(categories)
}

pub fn router(state: ServerState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/api/channels", get(list_channels))
        .route("/api/categories", get(list_categories));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

pub async fn serve(config: &ServeConfig) -> Result<()> {
    let source = PlaylistSource::from_location(&config.playlist);
    let playlist = PlaylistCache::new(source, Duration::from_secs(config.ttl_secs))?;
    let app = router(ServerState::new(playlist), config.static_dir.as_deref());

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Content server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .with_context(|| "Content server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const PLAYLIST: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="BBC.uk" group-title="News;UK",BBC News
http://x/bbc.m3u8
#EXTINF:-1 group-title="Music;Radio",Jazz FM
http://x/jazz.m3u8
#EXTINF:-1 group-title="News",CNN
http://x/cnn.m3u8
"#;

    fn state() -> ServerState {
        let cache = PlaylistCache::new(
            PlaylistSource::Inline(PLAYLIST.to_string()),
            Duration::from_secs(3600),
        )
        .unwrap();
        ServerState::new(cache)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(app: Router, uri: &str) -> T {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn location_picks_url_or_file() {
        assert_eq!(
            PlaylistSource::from_location("https://host/list.m3u"),
            PlaylistSource::Url("https://host/list.m3u".to_string())
        );
        assert_eq!(
            PlaylistSource::from_location("/srv/list.m3u"),
            PlaylistSource::File(PathBuf::from("/srv/list.m3u"))
        );
    }

    #[test]
    fn category_filter_is_exact_and_search_is_loose() {
        let channels = m3u::parse(PLAYLIST);
        let news = filter_channels(&channels, Some("News"), None);
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].name, "CNN");

        let radio = filter_channels(&channels, None, Some("RADIO"));
        assert_eq!(radio.len(), 1);
        assert_eq!(radio[0].name, "Jazz FM");

        assert_eq!(filter_channels(&channels, Some(""), Some("")).len(), 3);
    }

    #[test]
    fn categories_are_atomic_sorted_and_unique() {
        let channels = m3u::parse(PLAYLIST);
        assert_eq!(
            collect_categories(&channels),
            vec!["Music", "News", "Radio", "UK"]
        );
    }

    #[tokio::test]
    async fn channels_endpoint_applies_query() {
        let channels: Vec<Channel> =
            get_json(router(state(), None), "/api/channels?search=bbc").await;
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id.as_deref(), Some("BBC.uk"));
    }

    #[tokio::test]
    async fn categories_endpoint_lists_tags() {
        let categories: Vec<String> = get_json(router(state(), None), "/api/categories").await;
        assert_eq!(categories, vec!["Music", "News", "Radio", "UK"]);
    }

    #[tokio::test]
    async fn unreadable_playlist_yields_empty_list() {
        let cache = PlaylistCache::new(
            PlaylistSource::File(PathBuf::from("/nonexistent/tvgrid/list.m3u")),
            Duration::from_secs(3600),
        )
        .unwrap();
        assert!(cache.channels().await.is_empty());
        assert!(cache.entry.read().await.is_none());
    }

    #[tokio::test]
    async fn static_dir_is_served_as_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>grid</html>").unwrap();

        let response = router(state(), Some(dir.path()))
            .oneshot(
                Request::builder()
                    .uri("/index.html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<html>grid</html>");
    }
}
