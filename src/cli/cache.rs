// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use url::Url;

use tvgrid::assets::{AssetCache, HttpFetcher};
use tvgrid::config::CacheConfig;

pub enum CacheCommand {
    Install,
    List,
    Clear,
    Fetch { path: String },
}

impl CacheCommand {
    pub async fn execute(self, config: &CacheConfig, server_url: &str) -> Result<()> {
        let cache = AssetCache::open_default(&config.name)?;
        let origin = Url::parse(server_url)
            .with_context(|| format!("Invalid server URL: {}", server_url))?;

        match self {
            Self::Install => {
                let fetcher = HttpFetcher::new()?;
                let pb = ProgressBar::new(config.assets.len() as u64);
                let template = "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}";
                pb.set_style(
                    ProgressStyle::with_template(template)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );

                let result = cache
                    .install(&fetcher, &origin, &config.assets, |done, asset| {
                        pb.set_position(done as u64);
                        pb.set_message(asset.to_string());
                    })
                    .await;

                match result {
                    Ok(count) => {
                        pb.finish_and_clear();
                        let removed = cache.activate().await?;
                        for name in removed {
                            eprintln!("Removed stale cache '{}'", name);
                        }
                        println!("✓ Cached {} assets in '{}'", count, cache.name());
                    }
                    Err(e) => {
                        pb.abandon();
                        return Err(e.context("Install failed, cache left unchanged"));
                    }
                }
            }
            Self::List => {
                let keys = cache.keys().await?;
                if keys.is_empty() {
                    println!("Cache '{}' is empty", cache.name());
                }
                for key in keys {
                    println!("{}", key);
                }
            }
            Self::Clear => {
                eprintln!("Clearing cache '{}'...", cache.name());
                cache.clear().await?;
                println!("Cache cleared");
            }
            Self::Fetch { path } => {
                let url = origin
                    .join(&path)
                    .with_context(|| format!("Invalid path: {}", path))?;
                let fetcher = HttpFetcher::new()?;
                let fetched = cache.fetch(&fetcher, url.as_str()).await?;
                eprintln!("{} bytes from {}", fetched.body.len(), fetched.source);
                std::io::stdout().write_all(&fetched.body)?;
            }
        }

        Ok(())
    }
}
