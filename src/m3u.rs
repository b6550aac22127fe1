// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::channel::Channel;

const DEFAULT_NAME: &str = "Unknown";
const DEFAULT_GROUP: &str = "General";

/// Value of a `key="value"` attribute inside an `#EXTINF` parameter list.
fn attribute<'a>(params: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("{}=\"", key);
    let mut search = params;
    while let Some(pos) = search.find(&pattern) {
        let preceded_by_word = search[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '-');
        let rest = &search[pos + pattern.len()..];
        if !preceded_by_word {
            return rest.find('"').map(|end| &rest[..end]);
        }
        search = rest;
    }
    None
}

/// Parses an extended M3U playlist into channels.
///
/// Every `#EXTINF` line opens an entry; the next line starting with `http`
/// supplies its stream URL. Entries without a URL are dropped.
pub fn parse(content: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    let mut pending: Option<Channel> = None;

    for line in content.lines() {
        let line = line.trim();
        if let Some(info) = line.strip_prefix("#EXTINF:") {
            let (params, name) = match info.split_once(',') {
                Some((params, name)) => (params, name.trim()),
                None => (info, DEFAULT_NAME),
            };
            let name = if name.is_empty() { DEFAULT_NAME } else { name };

            let mut channel = Channel::new(name, DEFAULT_GROUP, "");
            channel.id = attribute(params, "tvg-id")
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            channel.logo = attribute(params, "tvg-logo")
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            if let Some(group) = attribute(params, "group-title") {
                channel.group = group.to_string();
            }
            pending = Some(channel);
        } else if line.starts_with("http")
            && let Some(mut channel) = pending.take()
        {
            channel.url = line.to_string();
            channels.push(channel);
        }
    }

    channels
}

/// Serializes channels back into an extended M3U playlist.
pub fn write<'a>(channels: impl IntoIterator<Item = &'a Channel>) -> String {
    let mut out = String::from("#EXTM3U\n");
    for channel in channels {
        out.push_str("#EXTINF:-1");
        if let Some(id) = &channel.id {
            out.push_str(&format!(" tvg-id=\"{}\"", id));
        }
        if let Some(logo) = &channel.logo {
            out.push_str(&format!(" tvg-logo=\"{}\"", logo));
        }
        out.push_str(&format!(" group-title=\"{}\",{}\n", channel.group, channel.name));
        out.push_str(&channel.url);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="CNN.us" tvg-name="CNN" tvg-logo="https://img/cnn.png" group-title="News",CNN
https://cdn.example/cnn/index.m3u8
#EXTINF:-1 tvg-id="" group-title="Music;Radio",Jazz FM
#EXTVLCOPT:http-user-agent=Mozilla
http://radio.example/jazz.m3u8
#EXTINF:-1,No Attributes
http://plain.example/stream.m3u8
#EXTINF:-1 group-title="Kids",Orphan Without Url
"#;

    #[test]
    fn parses_attributes_and_names() {
        let channels = parse(PLAYLIST);
        assert_eq!(channels.len(), 3);

        assert_eq!(channels[0].name, "CNN");
        assert_eq!(channels[0].id.as_deref(), Some("CNN.us"));
        assert_eq!(channels[0].logo.as_deref(), Some("https://img/cnn.png"));
        assert_eq!(channels[0].group, "News");
        assert_eq!(channels[0].url, "https://cdn.example/cnn/index.m3u8");

        assert_eq!(channels[1].name, "Jazz FM");
        assert_eq!(channels[1].id, None);
        assert_eq!(channels[1].group, "Music;Radio");
        assert_eq!(channels[1].url, "http://radio.example/jazz.m3u8");
    }

    #[test]
    fn missing_attributes_use_defaults() {
        let channels = parse(PLAYLIST);
        assert_eq!(channels[2].name, "No Attributes");
        assert_eq!(channels[2].group, "General");
        assert_eq!(channels[2].logo, None);
    }

    #[test]
    fn tvg_name_does_not_shadow_other_keys() {
        let params = r#"-1 xtvg-id="wrong" tvg-id="right""#;
        assert_eq!(attribute(params, "tvg-id"), Some("right"));
    }

    #[test]
    fn urls_without_extinf_are_ignored() {
        assert!(parse("#EXTM3U\nhttp://lonely.example/a.m3u8\n").is_empty());
    }

    #[test]
    fn written_playlist_parses_back() {
        let channels = parse(PLAYLIST);
        let text = write(&channels);
        assert!(text.starts_with("#EXTM3U\n"));
        let cnn = r#"tvg-id="CNN.us" tvg-logo="https://img/cnn.png" group-title="News",CNN"#;
        assert!(text.contains(cnn));
        assert_eq!(parse(&text), channels);
    }
}
