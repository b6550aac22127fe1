// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Named on-disk cache for the front end's static assets.
//!
//! `install` precaches a fixed asset list, `fetch` routes every request:
//! API calls and adaptive manifests always go to the network, anything else is
//! served cache-first with a network fallback.

use anyhow::{Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs as async_fs;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_CACHE_NAME: &str = "tvgrid-static-v1";

/// Document root, main script, stylesheet and web manifest.
pub const PRECACHE_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/app.js",
    "/style.css",
    "/manifest.json",
];

const API_SEGMENT: &str = "/api/";
const MANIFEST_EXTENSIONS: &[&str] = &[".m3u8", ".mpd"];
const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Network,
    CacheFirst,
}

pub fn route_for(url: &str) -> Route {
    if url.contains(API_SEGMENT) || MANIFEST_EXTENSIONS.iter().any(|ext| url.contains(ext)) {
        Route::Network
    } else {
        Route::CacheFirst
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Cache => write!(f, "cache"),
            Source::Network => write!(f, "network"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub source: Source,
}

#[allow(async_fn_in_trait)]
pub trait AssetFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(concat!("tvgrid/", env!("CARGO_PKG_VERSION")))
                .build()?,
        })
    }
}

impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP request for {} failed with status: {}", url, response.status());
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = futures_util::StreamExt::next(&mut stream).await {
            let chunk =
                chunk.with_context(|| format!("Failed to read response chunk from {}", url))?;
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[derive(Debug, Clone)]
pub struct AssetCache {
    root: PathBuf,
    name: String,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    /// Cache rooted under the platform cache directory.
    pub fn open_default(name: &str) -> Result<Self> {
        let root = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
            .join("tvgrid")
            .join("assets");
        Ok(Self::new(root, name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash = format!("{:x}", hasher.finalize())[..16].to_string();
        self.dir().join(format!("{}.bin", hash))
    }

    async fn load_index(&self) -> Result<BTreeMap<String, String>> {
        let index_path = self.dir().join(INDEX_FILE);
        if !async_fs::try_exists(&index_path).await.unwrap_or(false) {
            return Ok(BTreeMap::new());
        }
        let content = async_fs::read_to_string(&index_path)
            .await
            .with_context(|| format!("Failed to read cache index: {}", index_path.display()))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse cache index JSON")
    }

    async fn save_index(&self, index: &BTreeMap<String, String>) -> Result<()> {
        let index_path = self.dir().join(INDEX_FILE);
        let content =
            serde_json::to_string_pretty(index).with_context(|| "Failed to serialize cache index")?;
        async_fs::write(&index_path, content)
            .await
            .with_context(|| format!("Failed to write cache index: {}", index_path.display()))
    }

    pub async fn put(&self, url: &str, body: &[u8]) -> Result<()> {
        let dir = self.dir();
        async_fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

        let path = self.entry_path(url);
        async_fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write cache entry: {}", path.display()))?;

        let mut index = self.load_index().await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        index.insert(url.to_string(), file_name);
        self.save_index(&index).await
    }

    pub async fn lookup(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(url);
        if !async_fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let body = async_fs::read(&path)
            .await
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))?;
        Ok(Some(body))
    }

    /// Precaches every asset of the list or nothing at all.
    pub async fn install<F, P>(
        &self,
        fetcher: &F,
        origin: &Url,
        assets: &[String],
        mut on_progress: P,
    ) -> Result<usize>
    where
        F: AssetFetcher,
        P: FnMut(usize, &str),
    {
        let mut fetched = Vec::with_capacity(assets.len());
        for (i, asset) in assets.iter().enumerate() {
            let url = origin
                .join(asset)
                .with_context(|| format!("Invalid asset path: {}", asset))?;
            let body = fetcher
                .fetch(url.as_str())
                .await
                .with_context(|| format!("Failed to precache {}", url))?;
            on_progress(i + 1, asset);
            fetched.push((url, body));
        }

        for (url, body) in &fetched {
            self.put(url.as_str(), body).await?;
        }

        info!("Precached {} assets into cache '{}'", fetched.len(), self.name);
        Ok(fetched.len())
    }

    /// Removes every sibling cache with a different name, returning their names.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        if !async_fs::try_exists(&self.root).await.unwrap_or(false) {
            return Ok(removed);
        }

        let mut entries = async_fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to list caches in {}", self.root.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == self.name || !entry.file_type().await?.is_dir() {
                continue;
            }
            debug!("Removing stale asset cache '{}'", name);
            async_fs::remove_dir_all(entry.path())
                .await
                .with_context(|| format!("Failed to remove stale cache: {}", name))?;
            removed.push(name);
        }
        Ok(removed)
    }

    pub async fn fetch<F: AssetFetcher>(&self, fetcher: &F, url: &str) -> Result<Fetched> {
        if route_for(url) == Route::CacheFirst
            && let Some(body) = self.lookup(url).await?
        {
            debug!("Serving {} from cache '{}'", url, self.name);
            return Ok(Fetched {
                body,
                source: Source::Cache,
            });
        }

        debug!("Fetching {} from network", url);
        let body = fetcher.fetch(url).await?;
        Ok(Fetched {
            body,
            source: Source::Network,
        })
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.load_index().await?.into_keys().collect())
    }

    pub async fn clear(&self) -> Result<()> {
        let dir = self.dir();
        if async_fs::try_exists(&dir).await.unwrap_or(false) {
            async_fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to remove cache directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFetcher {
        requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl AssetFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(url.to_string());
            if url.contains("missing") {
                anyhow::bail!("404 for {}", url);
            }
            Ok(format!("network:{}", url).into_bytes())
        }
    }

    fn assets() -> Vec<String> {
        PRECACHE_ASSETS.iter().map(|s| s.to_string()).collect()
    }

    fn origin() -> Url {
        Url::parse("http://tv.local:5000").unwrap()
    }

    #[test]
    fn api_and_manifest_requests_bypass_cache() {
        assert_eq!(route_for("http://tv.local/api/channels"), Route::Network);
        assert_eq!(route_for("http://tv.local/api/categories?x=1"), Route::Network);
        assert_eq!(route_for("https://cdn.example/live/master.m3u8"), Route::Network);
        assert_eq!(route_for("https://cdn.example/live/stream.mpd"), Route::Network);
        assert_eq!(route_for("http://tv.local/index.html"), Route::CacheFirst);
        assert_eq!(route_for("http://tv.local/app.js"), Route::CacheFirst);
    }

    #[tokio::test]
    async fn install_precaches_exactly_the_asset_list() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), DEFAULT_CACHE_NAME);
        let fetcher = FakeFetcher::default();

        let mut progress = Vec::new();
        let count = cache
            .install(&fetcher, &origin(), &assets(), |n, _| progress.push(n))
            .await
            .unwrap();

        assert_eq!(count, PRECACHE_ASSETS.len());
        assert_eq!(progress, vec![1, 2, 3, 4, 5]);

        let expected: Vec<String> = PRECACHE_ASSETS
            .iter()
            .map(|a| origin().join(a).unwrap().to_string())
            .collect();
        assert_eq!(fetcher.requests(), expected);

        let mut keys = cache.keys().await.unwrap();
        keys.sort();
        let mut expected_sorted = expected.clone();
        expected_sorted.sort();
        assert_eq!(keys, expected_sorted);
    }

    #[tokio::test]
    async fn failed_install_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), DEFAULT_CACHE_NAME);
        let fetcher = FakeFetcher::default();
        let list = vec!["/index.html".to_string(), "/missing.css".to_string()];

        assert!(cache.install(&fetcher, &origin(), &list, |_, _| {}).await.is_err());
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_served_from_cache_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), DEFAULT_CACHE_NAME);
        cache
            .put("http://tv.local:5000/index.html", b"<html>cached</html>")
            .await
            .unwrap();

        let fetcher = FakeFetcher::default();
        let fetched = cache
            .fetch(&fetcher, "http://tv.local:5000/index.html")
            .await
            .unwrap();

        assert_eq!(fetched.source, Source::Cache);
        assert_eq!(fetched.body, b"<html>cached</html>");
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn api_request_never_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), DEFAULT_CACHE_NAME);
        let url = "http://tv.local:5000/api/channels";
        cache.put(url, b"[stale]").await.unwrap();

        let fetcher = FakeFetcher::default();
        let fetched = cache.fetch(&fetcher, url).await.unwrap();

        assert_eq!(fetched.source, Source::Network);
        assert_eq!(fetcher.requests(), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn cache_miss_falls_back_to_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), DEFAULT_CACHE_NAME);
        let fetcher = FakeFetcher::default();

        let fetched = cache
            .fetch(&fetcher, "http://tv.local:5000/style.css")
            .await
            .unwrap();
        assert_eq!(fetched.source, Source::Network);
        assert_eq!(fetched.body, b"network:http://tv.local:5000/style.css");
    }

    #[tokio::test]
    async fn activate_removes_other_named_caches() {
        let dir = tempfile::tempdir().unwrap();
        let old = AssetCache::new(dir.path(), "tvgrid-static-v0");
        old.put("http://tv.local/app.js", b"old").await.unwrap();
        let current = AssetCache::new(dir.path(), DEFAULT_CACHE_NAME);
        current.put("http://tv.local/app.js", b"new").await.unwrap();

        let removed = current.activate().await.unwrap();
        assert_eq!(removed, vec!["tvgrid-static-v0".to_string()]);
        assert!(old.keys().await.unwrap().is_empty());
        assert_eq!(
            current.lookup("http://tv.local/app.js").await.unwrap(),
            Some(b"new".to_vec())
        );
    }

    #[tokio::test]
    async fn clear_drops_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path(), DEFAULT_CACHE_NAME);
        cache.put("http://tv.local/app.js", b"js").await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.keys().await.unwrap().is_empty());
        assert_eq!(cache.lookup("http://tv.local/app.js").await.unwrap(), None);
    }
}
