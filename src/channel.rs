// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use serde::{Deserialize, Deserializer, Serialize};

/// Category labels are plain strings fetched independently of channels.
pub type Category = String;

fn deserialize_empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// Semicolon separated tag list, first tag is the primary category
    #[serde(default)]
    pub group: String,
    pub url: String,
    #[serde(
        default,
        deserialize_with = "deserialize_empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub logo: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>, group: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            url: url.into(),
            logo: None,
            id: None,
        }
    }

    /// Trimmed, non-empty tags of the group string in order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.group
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }

    pub fn primary_category(&self) -> Option<&str> {
        self.tags().next()
    }

    /// `needle` must already be lowercased.
    pub fn group_contains(&self, needle: &str) -> bool {
        self.group.to_lowercase().contains(needle)
    }

    pub fn has_tag(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.tags().any(|tag| tag.to_lowercase() == label)
    }

    /// `needle` must already be lowercased.
    pub fn matches_query(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.group_contains(needle)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_split_on_semicolons_and_skip_blanks() {
        let channel = Channel::new("BBC News", " News ; UK;;", "http://x/bbc.m3u8");
        assert_eq!(channel.tags().collect::<Vec<_>>(), vec!["News", "UK"]);
        assert_eq!(channel.primary_category(), Some("News"));
    }

    #[test]
    fn empty_group_has_no_primary_category() {
        let channel = Channel::new("Nameless", "", "http://x/a.m3u8");
        assert_eq!(channel.primary_category(), None);
    }

    #[test]
    fn empty_logo_from_wire_is_absent() {
        let json = serde_json::json!({
            "name": "Jazz FM",
            "group": "Music;Radio",
            "url": "http://x/jazz.m3u8",
            "logo": "",
            "id": "JazzFM.uk",
        });
        let channel: Channel = serde_json::from_value(json).unwrap();
        assert_eq!(channel.logo, None);
        assert_eq!(channel.id.as_deref(), Some("JazzFM.uk"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let channel: Channel =
            serde_json::from_str(r#"{"name":"Plain","url":"http://x/p.m3u8"}"#).unwrap();
        assert_eq!(channel.group, "");
        assert_eq!(channel.logo, None);
    }

    #[test]
    fn query_matches_name_or_group_case_insensitively() {
        let channel = Channel::new("BBC News", "News;UK", "http://x/bbc.m3u8");
        assert!(channel.matches_query("bbc"));
        assert!(channel.matches_query("uk"));
        assert!(!channel.matches_query("jazz"));
    }

    #[test]
    fn has_tag_requires_whole_tag() {
        let channel = Channel::new("Letters", "Newsletter;Culture", "http://x/l.m3u8");
        assert!(!channel.has_tag("news"));
        assert!(channel.has_tag("culture"));
        assert!(channel.group_contains("news"));
    }
}
