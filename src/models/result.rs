//! Normalized search result model
//!
//! Every provider adapter translates its wire format into `SearchResult`;
//! everything downstream (scoring, processing, display) speaks only this type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// Audio container format, ordered roughly by desirability for audiobooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    M4b,
    M4a,
    Mp3,
    Flac,
    Aac,
    Ogg,
    #[default]
    Unknown,
}

impl AudioFormat {
    /// Parse a loosely formatted container label ("M4B", "mp3", "Flac")
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "m4b" => Self::M4b,
            "m4a" => Self::M4a,
            "mp3" => Self::Mp3,
            "flac" => Self::Flac,
            "aac" => Self::Aac,
            "ogg" => Self::Ogg,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::M4b => write!(f, "m4b"),
            Self::M4a => write!(f, "m4a"),
            Self::Mp3 => write!(f, "mp3"),
            Self::Flac => write!(f, "flac"),
            Self::Aac => write!(f, "aac"),
            Self::Ogg => write!(f, "ogg"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Delivery protocol for a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Torrent,
    Direct,
}

/// A single normalized audiobook search result
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResult {
    /// Display name of the indexer that produced this result
    pub indexer_name: String,

    /// Provider-side identifier (torrent id, guid, info hash, ...)
    pub indexer_id: String,

    /// Release title
    pub title: String,

    /// Author name(s), comma-joined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Narrator name(s), comma-joined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrator: Option<String>,

    /// Series name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    /// Position within the series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,

    /// Language code or name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Audio container
    #[serde(default)]
    pub format: AudioFormat,

    /// Bitrate in kbps, 0 when unknown
    #[serde(default)]
    pub bitrate_kbps: u32,

    /// Total size in bytes, 0 when unknown
    #[serde(default)]
    pub size_bytes: u64,

    /// Seeder count, -1 when the provider does not publish it
    pub seeders: i64,

    /// Peer/leecher count, -1 when unknown
    pub peers: i64,

    /// Delivery protocol
    #[serde(default)]
    pub protocol: Protocol,

    /// Category id or label from the provider
    pub category: String,

    /// ISO 8601 publication date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,

    /// .torrent URL or magnet URI; never empty on an emitted result
    pub download_url: String,

    /// Details page URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,

    /// 40-hex SHA-1 info hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,

    /// Magnet URI when one was found or constructed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,

    /// Provider-specific attributes kept for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_attributes: Option<HashMap<String, String>>,

    /// Which variant query produced this result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query_used: Option<String>,
}

impl SearchResult {
    /// Create a result with the required fields; everything else defaults
    pub fn new(title: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            download_url: download_url.into(),
            seeders: -1,
            peers: -1,
            ..Default::default()
        }
    }
}

/// Public trackers appended to magnets when a provider supplies none
pub const DEFAULT_TRACKERS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://tracker.openbittorrent.com:6969/announce",
    "udp://exodus.desync.com:6969/announce",
    "udp://tracker.dler.org:6969/announce",
    "udp://tracker.moeking.me:6969/announce",
];

/// Whether a URL points at an actual .torrent file (as opposed to a details
/// page or magnet). Accepts a bittorrent content type, a `.torrent` path, or
/// a `file=`/`filename=` query parameter naming a .torrent.
pub fn is_torrent_url(url: &str, content_type: &str) -> bool {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return false;
    }
    if content_type.to_lowercase().contains("bittorrent") {
        return true;
    }

    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if parsed.path().to_lowercase().ends_with(".torrent") {
        return true;
    }

    parsed.query_pairs().any(|(key, value)| {
        (key == "file" || key == "filename") && value.to_lowercase().ends_with(".torrent")
    })
}

/// Build a magnet URI from an info hash. Always carries a display name and at
/// least one tracker (falling back to the embedded public list).
pub fn build_magnet(info_hash: &str, trackers: &[String], display_name: &str) -> Option<String> {
    let info_hash = info_hash.trim();
    if info_hash.is_empty() {
        return None;
    }

    let mut parts = vec![format!("magnet:?xt=urn:btih:{}", info_hash.to_lowercase())];

    if trackers.is_empty() {
        for tracker in DEFAULT_TRACKERS {
            parts.push(format!("tr={}", urlencoding::encode(tracker)));
        }
    } else {
        for tracker in trackers {
            parts.push(format!("tr={}", urlencoding::encode(tracker)));
        }
    }

    if !display_name.is_empty() {
        parts.push(format!("dn={}", urlencoding::encode(display_name)));
    }

    Some(parts.join("&"))
}
