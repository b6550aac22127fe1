// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assets::{DEFAULT_CACHE_NAME, PRECACHE_ASSETS};
use crate::view::MatchMode;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_PLAYLIST_URL: &str = "https://iptv-org.github.io/iptv/index.m3u";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Where the channel and category endpoints live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerPreference {
    /// mpv when installed, otherwise ffplay
    #[default]
    Auto,
    Mpv,
    Ffplay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub preference: PlayerPreference,
    /// Extra arguments appended to the mpv command line
    #[serde(default)]
    pub mpv_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_section_cap")]
    pub section_cap: usize,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_autohide_ms")]
    pub autohide_ms: u64,
    #[serde(default = "default_compact_width")]
    pub compact_width: u16,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_name")]
    pub name: String,
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Playlist source, either an http(s) URL or a local file path
    #[serde(default = "default_playlist")]
    pub playlist: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_server_url() -> String {
    std::env::var("TVGRID_SERVER").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string())
}

fn default_section_cap() -> usize {
    12
}

fn default_idle_timeout_ms() -> u64 {
    3000
}

fn default_autohide_ms() -> u64 {
    3000
}

fn default_compact_width() -> u16 {
    80
}

fn default_tick_rate_ms() -> u64 {
    100
}

fn default_cache_name() -> String {
    DEFAULT_CACHE_NAME.to_string()
}

fn default_assets() -> Vec<String> {
    PRECACHE_ASSETS.iter().map(|s| s.to_string()).collect()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_playlist() -> String {
    DEFAULT_PLAYLIST_URL.to_string()
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preference: PlayerPreference::Auto,
            mpv_args: Vec::new(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            section_cap: default_section_cap(),
            idle_timeout_ms: default_idle_timeout_ms(),
            autohide_ms: default_autohide_ms(),
            compact_width: default_compact_width(),
            match_mode: MatchMode::default(),
            tick_rate_ms: default_tick_rate_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_cache_name(),
            assets: default_assets(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            playlist: default_playlist(),
            ttl_secs: default_ttl_secs(),
            static_dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("tvgrid").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Config {
        if !path.as_ref().exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config file, using defaults: {:#}", e);
            Self::default()
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ui]
            section_cap = 4
            match_mode = "exact-tag"

            [player]
            preference = "ffplay"
            "#,
        )
        .unwrap();

        assert_eq!(config.ui.section_cap, 4);
        assert_eq!(config.ui.match_mode, MatchMode::ExactTag);
        assert_eq!(config.ui.idle_timeout_ms, 3000);
        assert_eq!(config.player.preference, PlayerPreference::Ffplay);
        assert_eq!(config.cache.assets.len(), PRECACHE_ASSETS.len());
        assert_eq!(config.serve.port, 5000);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.server.url = "http://tv.local:8080".to_string();
        config.serve.static_dir = Some(PathBuf::from("/srv/www"));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server.url, "http://tv.local:8080");
        assert_eq!(loaded.serve.static_dir, Some(PathBuf::from("/srv/www")));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml"));
        assert_eq!(config.ui.compact_width, 80);
    }
}
