// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Pure derivation of the visible sections from the catalog and the current
//! filters. The terminal renderer only ever draws what [`derive`] returns.

use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// Sentinel category that selects the dashboard.
pub const ALL_CATEGORY: &str = "All";

pub const TRENDING_TITLE: &str = "Trending";

/// Well-known tags shown on the dashboard after "Trending", in order.
pub const DASHBOARD_TAGS: [(&str, &str); 3] =
    [("news", "News"), ("sports", "Sports"), ("music", "Music")];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Case-insensitive containment against the whole group string
    #[default]
    Substring,
    /// Case-insensitive equality against one of the semicolon separated tags
    ExactTag,
}

impl MatchMode {
    fn matches(self, channel: &Channel, label: &str) -> bool {
        match self {
            MatchMode::Substring => channel.group_contains(&label.to_lowercase()),
            MatchMode::ExactTag => channel.has_tag(label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub section_cap: usize,
    pub match_mode: MatchMode,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            section_cap: 12,
            match_mode: MatchMode::Substring,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Search,
    Category,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    /// Indices into the channel list the view was derived from
    pub channels: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub kind: ViewKind,
    pub sections: Vec<Section>,
}

impl View {
    pub fn empty() -> Self {
        Self {
            kind: ViewKind::Dashboard,
            sections: Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.channels.len()).sum()
    }

    /// Channel index of the n-th card when all sections are laid out in order.
    pub fn channel_at(&self, position: usize) -> Option<usize> {
        self.sections
            .iter()
            .flat_map(|s| s.channels.iter().copied())
            .nth(position)
    }
}

pub fn derive(channels: &[Channel], category: &str, query: &str, options: &ViewOptions) -> View {
    if !query.is_empty() {
        let needle = query.to_lowercase();
        let hits = channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.matches_query(&needle))
            .map(|(i, _)| i)
            .collect();
        return View {
            kind: ViewKind::Search,
            sections: vec![Section {
                title: query.to_string(),
                channels: hits,
            }],
        };
    }

    if category != ALL_CATEGORY {
        let hits = channels
            .iter()
            .enumerate()
            .filter(|(_, c)| options.match_mode.matches(c, category))
            .map(|(i, _)| i)
            .collect();
        return View {
            kind: ViewKind::Category,
            sections: vec![Section {
                title: category.to_string(),
                channels: hits,
            }],
        };
    }

    let cap = options.section_cap;
    let mut sections = Vec::with_capacity(1 + DASHBOARD_TAGS.len());
    sections.push(Section {
        title: TRENDING_TITLE.to_string(),
        channels: (0..channels.len().min(cap)).collect(),
    });
    for (tag, title) in DASHBOARD_TAGS {
        let hits = channels
            .iter()
            .enumerate()
            .filter(|(_, c)| options.match_mode.matches(c, tag))
            .map(|(i, _)| i)
            .take(cap)
            .collect();
        sections.push(Section {
            title: title.to_string(),
            channels: hits,
        });
    }
    sections.retain(|s| !s.channels.is_empty());

    View {
        kind: ViewKind::Dashboard,
        sections,
    }
}
