// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use std::path::Path;
use std::time::Duration;

use tvgrid::api::ContentClient;
use tvgrid::assets::{AssetCache, HttpFetcher, PRECACHE_ASSETS, Source};
use tvgrid::server::{PlaylistCache, PlaylistSource, ServerState, router};
use tvgrid::view::{self, ALL_CATEGORY, ViewKind, ViewOptions};
use url::Url;

const PLAYLIST: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="BBC.uk" group-title="News;UK",BBC News
http://streams.example/bbc.m3u8
#EXTINF:-1 group-title="Music;Radio",Jazz FM
http://streams.example/jazz.m3u8
#EXTINF:-1 group-title="Sports",Match Day
http://streams.example/match.m3u8
"#;

/// Starts the backend on an ephemeral port and returns its base URL.
async fn spawn_server(static_dir: Option<&Path>) -> String {
    let playlist = PlaylistCache::new(
        PlaylistSource::Inline(PLAYLIST.to_string()),
        Duration::from_secs(3600),
    )
    .unwrap();
    let app = router(ServerState::new(playlist), static_dir);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn client_loads_catalog_and_derives_dashboard() {
    let base = spawn_server(None).await;
    let client = ContentClient::new(&base).unwrap();

    let catalog = client.load_catalog().await;
    assert!(catalog.errors.is_empty(), "{:?}", catalog.errors);
    assert_eq!(catalog.channels.len(), 3);
    assert_eq!(
        catalog.categories,
        vec!["Music", "News", "Radio", "Sports", "UK"]
    );

    let options = ViewOptions::default();
    let dashboard = view::derive(&catalog.channels, ALL_CATEGORY, "", &options);
    assert_eq!(dashboard.kind, ViewKind::Dashboard);
    let titles: Vec<_> = dashboard.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Trending", "News", "Sports", "Music"]);

    let search = view::derive(&catalog.channels, "Sports", "jazz", &options);
    assert_eq!(search.kind, ViewKind::Search);
    assert_eq!(search.sections[0].channels, vec![1]);
}

#[tokio::test]
async fn asset_cache_installs_from_backend_and_serves_offline() {
    let site = tempfile::tempdir().unwrap();
    for (file, body) in [
        ("index.html", "<html>tvgrid</html>"),
        ("app.js", "console.log('grid')"),
        ("style.css", "body {}"),
        ("manifest.json", "{}"),
    ] {
        std::fs::write(site.path().join(file), body).unwrap();
    }
    let base = spawn_server(Some(site.path())).await;
    let origin = Url::parse(&base).unwrap();

    let cache_root = tempfile::tempdir().unwrap();
    let cache = AssetCache::new(cache_root.path(), "tvgrid-static-test");
    let fetcher = HttpFetcher::new().unwrap();
    let assets: Vec<String> = PRECACHE_ASSETS.iter().map(|s| s.to_string()).collect();

    let mut seen = Vec::new();
    let count = cache
        .install(&fetcher, &origin, &assets, |_, asset| seen.push(asset.to_string()))
        .await
        .unwrap();
    assert_eq!(count, assets.len());
    assert_eq!(seen, assets);

    let script = cache
        .fetch(&fetcher, origin.join("/app.js").unwrap().as_str())
        .await
        .unwrap();
    assert_eq!(script.source, Source::Cache);
    assert_eq!(script.body, b"console.log('grid')");

    let api = cache
        .fetch(&fetcher, origin.join("/api/categories").unwrap().as_str())
        .await
        .unwrap();
    assert_eq!(api.source, Source::Network);
}

#[tokio::test]
async fn failed_install_leaves_cache_empty() {
    // No static directory, so every asset request 404s
    let base = spawn_server(None).await;
    let origin = Url::parse(&base).unwrap();

    let cache_root = tempfile::tempdir().unwrap();
    let cache = AssetCache::new(cache_root.path(), "tvgrid-static-test");
    let fetcher = HttpFetcher::new().unwrap();
    let assets = vec!["/index.html".to_string()];

    assert!(cache.install(&fetcher, &origin, &assets, |_, _| {}).await.is_err());
    assert!(cache.keys().await.unwrap().is_empty());
}
