// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::OutputFormat;
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeSet;

use tvgrid::api::{Catalog, ContentClient};
use tvgrid::channel::Channel;
use tvgrid::m3u;
use tvgrid::view::{self, ALL_CATEGORY, View, ViewOptions};

/// Loads the catalog, failing only when nothing at all came back.
async fn load(client: &ContentClient) -> Result<Catalog> {
    eprintln!("Fetching from {}...", client.base_url());
    let catalog = client.load_catalog().await;
    if catalog.channels.is_empty() && catalog.categories.is_empty() && !catalog.errors.is_empty() {
        anyhow::bail!("{}", catalog.errors.join("; "));
    }
    for error in &catalog.errors {
        eprintln!("Warning: {}", error);
    }
    Ok(catalog)
}

pub struct ListCommand {
    pub category: Option<String>,
    pub search: Option<String>,
    pub format: OutputFormat,
}

impl ListCommand {
    pub async fn execute(self, client: &ContentClient, options: &ViewOptions) -> Result<()> {
        let catalog = load(client).await?;
        let category = self.category.as_deref().unwrap_or(ALL_CATEGORY);
        let query = self.search.as_deref().unwrap_or("");
        let view = view::derive(&catalog.channels, category, query, options);

        print!("{}", render(&view, &catalog.channels, self.format)?);
        Ok(())
    }
}

pub struct CategoriesCommand {
    pub format: OutputFormat,
}

impl CategoriesCommand {
    pub async fn execute(self, client: &ContentClient) -> Result<()> {
        let catalog = load(client).await?;
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&catalog.categories)?)
            }
            _ => {
                for category in &catalog.categories {
                    println!("{}", category);
                }
            }
        }
        Ok(())
    }
}

fn render(view: &View, channels: &[Channel], format: OutputFormat) -> Result<String> {
    let mut out = String::new();
    match format {
        OutputFormat::Json => {
            let sections: Vec<_> = view
                .sections
                .iter()
                .map(|section| {
                    let items: Vec<&Channel> = section
                        .channels
                        .iter()
                        .filter_map(|i| channels.get(*i))
                        .collect();
                    json!({ "title": section.title, "channels": items })
                })
                .collect();
            out.push_str(&serde_json::to_string_pretty(&sections)?);
            out.push('\n');
        }
        OutputFormat::Text => {
            if view.item_count() == 0 {
                out.push_str("No channels found\n");
            }
            for section in view.sections.iter().filter(|s| !s.channels.is_empty()) {
                out.push_str(&format!("\n{} ({}):\n", section.title, section.channels.len()));
                for channel in section.channels.iter().filter_map(|i| channels.get(*i)) {
                    out.push_str(&format!(
                        "  {:30} | {:20} | {}\n",
                        channel.name,
                        channel.primary_category().unwrap_or("-"),
                        channel.url
                    ));
                }
            }
        }
        OutputFormat::M3u => {
            // A channel shown in several dashboard sections is written once
            let mut seen = BTreeSet::new();
            let unique = view
                .sections
                .iter()
                .flat_map(|s| s.channels.iter().copied())
                .filter(|i| seen.insert(*i))
                .filter_map(|i| channels.get(i));
            out.push_str(&m3u::write(unique));
        }
    }
    Ok(out)
}
