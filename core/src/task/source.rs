//! URL validation, playlist detection and source platform classification.

use serde::{Deserialize, Serialize};
use url::Url;

/// Returns the trimmed URL when it is an http(s) URL with a host.
pub fn validate_url(raw: &str) -> Option<(String, Url)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some((trimmed.to_string(), parsed)),
        _ => None,
    }
}

/// A URL bears a playlist when it carries a `list=` query parameter or a
/// `playlist` / `sets` path segment.
pub fn is_playlist_url(url: &Url) -> bool {
    if url.query_pairs().any(|(k, v)| k == "list" && !v.is_empty()) {
        return true;
    }
    url.path_segments()
        .map(|mut segs| segs.any(|s| s.eq_ignore_ascii_case("playlist") || s == "sets"))
        .unwrap_or(false)
}

/// Split free text into candidate URLs: one per line, blank lines and `#`
/// comments skipped, only http(s) URLs kept.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| validate_url(line).map(|(url, _)| url))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    Youtube,
    Tiktok,
    Instagram,
    Twitter,
    Facebook,
    Vimeo,
    Twitch,
    Bilibili,
    Soundcloud,
    Dailymotion,
    #[default]
    Other,
}

const HOSTS: &[(&str, SourcePlatform)] = &[
    ("youtube.com", SourcePlatform::Youtube),
    ("youtu.be", SourcePlatform::Youtube),
    ("tiktok.com", SourcePlatform::Tiktok),
    ("instagram.com", SourcePlatform::Instagram),
    ("twitter.com", SourcePlatform::Twitter),
    ("x.com", SourcePlatform::Twitter),
    ("facebook.com", SourcePlatform::Facebook),
    ("fb.watch", SourcePlatform::Facebook),
    ("vimeo.com", SourcePlatform::Vimeo),
    ("twitch.tv", SourcePlatform::Twitch),
    ("bilibili.com", SourcePlatform::Bilibili),
    ("b23.tv", SourcePlatform::Bilibili),
    ("soundcloud.com", SourcePlatform::Soundcloud),
    ("dailymotion.com", SourcePlatform::Dailymotion),
    ("dai.ly", SourcePlatform::Dailymotion),
];

impl SourcePlatform {
    pub fn from_url(url: &Url) -> Self {
        url.host_str().map(Self::from_host).unwrap_or_default()
    }

    pub fn from_host(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        HOSTS
            .iter()
            .find(|(domain, _)| {
                host == *domain
                    || host
                        .strip_suffix(domain)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(|(_, platform)| *platform)
            .unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Youtube => "YouTube",
            Self::Tiktok => "TikTok",
            Self::Instagram => "Instagram",
            Self::Twitter => "X/Twitter",
            Self::Facebook => "Facebook",
            Self::Vimeo => "Vimeo",
            Self::Twitch => "Twitch",
            Self::Bilibili => "Bilibili",
            Self::Soundcloud => "SoundCloud",
            Self::Dailymotion => "Dailymotion",
            Self::Other => "Video",
        }
    }
}
