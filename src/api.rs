// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::channel::{Category, Channel};

pub const CHANNELS_PATH: &str = "/api/channels";
pub const CATEGORIES_PATH: &str = "/api/categories";

/// Everything the browser needs before its first data render.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub channels: Vec<Channel>,
    pub categories: Vec<Category>,
    /// Human readable failures, one per endpoint that could not be loaded
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContentClient {
    client: Client,
    base_url: Url,
}

impl ContentClient {
    pub fn new(server_url: &str) -> Result<Self> {
        let base_url = Url::parse(server_url)
            .with_context(|| format!("Invalid server URL: {}", server_url))?;

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(concat!("tvgrid/", env!("CARGO_PKG_VERSION")))
                .build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Invalid request path: {}", path))?;
        debug!("Requesting {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "HTTP request to {} failed with status: {}",
                url,
                response.status()
            );
        }

        let body = response
            .text()
            .await
            .with_context(|| "Failed to read response body")?;

        serde_json::from_str(&body).with_context(|| format!("Failed to parse JSON from {}", url))
    }

    pub async fn fetch_channels(&self) -> Result<Vec<Channel>> {
        self.get_json(CHANNELS_PATH).await
    }

    pub async fn fetch_categories(&self) -> Result<Vec<Category>> {
        self.get_json(CATEGORIES_PATH).await
    }

    /// Issues both requests together and waits for both. A failing endpoint
    /// is logged and contributes an empty list instead of an error.
    pub async fn load_catalog(&self) -> Catalog {
        let (channels, categories) = tokio::join!(self.fetch_channels(), self.fetch_categories());
        let mut catalog = Catalog::default();

        match channels {
            Ok(channels) => catalog.channels = channels,
            Err(e) => {
                warn!("Failed to load channels: {:#}", e);
                catalog.errors.push(format!("Failed to load channels: {}", e));
            }
        }

        match categories {
            Ok(categories) => catalog.categories = categories,
            Err(e) => {
                warn!("Failed to load categories: {:#}", e);
                catalog
                    .errors
                    .push(format!("Failed to load categories: {}", e));
            }
        }

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_server_url() {
        assert!(ContentClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn unreachable_server_yields_empty_catalog() {
        // Port 9 (discard) is not expected to accept HTTP connections
        let client = ContentClient::new("http://127.0.0.1:9").unwrap();
        let catalog = client.load_catalog().await;
        assert!(catalog.channels.is_empty());
        assert!(catalog.categories.is_empty());
        assert_eq!(catalog.errors.len(), 2);
    }
}
