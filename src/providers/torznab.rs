//! Torznab provider adapter (Jackett/Prowlarr-compatible)
//!
//! Builds `t=caps|search|book` requests and parses the RSS XML response with
//! the `torznab:` attribute namespace. Only results with a usable torrent
//! download (a .torrent URL or a magnet constructible from an info hash) are
//! emitted.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::IndexerConfig;
use crate::models::result::{build_magnet, is_torrent_url};
use crate::models::{AudioFormat, Protocol, SearchResult};

use super::{
    Capabilities, CapabilityCategory, CapabilityLimits, HealthReport, Payload, ProviderAdapter,
    RequestSpec, SearchInput,
};

/// Standard Torznab audiobook category
const CATEGORY_AUDIOBOOK: &str = "3030";

static ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<item>([\s\S]*?)</item>").unwrap());
static ENCLOSURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<enclosure\s+([^>]*?)/?>"#).unwrap());
static XML_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([a-zA-Z:_-]+)="([^"]*)""#).unwrap());
static TORZNAB_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<torznab:attr\s+name="([^"]+)"\s+value="([^"]*)"\s*/?>"#).unwrap());
static CAPS_CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<(?:category|subcat) id="([^"]+)"(?:\s+name="([^"]*)")?"#).unwrap());

static FORMAT_BITRATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\[\(](m4b|m4a|mp3|flac|aac|ogg)\s+(\d{2,3})[\]\)]").unwrap());
static FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(m4b|m4a|mp3|flac|aac|ogg)\b").unwrap());
static BITRATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\[\(]?(\d+)\s*k(?:bps|b/s)[\]\)]?").unwrap());

static AUTHOR_DASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+-\s+([A-Z][A-Za-z\s\.,&]+?)\s*[\[(]").unwrap());
static AUTHOR_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+by\s+([A-Z][a-zA-Z\s\.]+?)(?:\s+[\[(]|$)").unwrap());

static CLEAN_QUERY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

/// Adapter speaking the Torznab RSS API
pub struct TorznabAdapter {
    indexer_name: String,
    categories: Vec<String>,
    /// True when the configured base URL already points at the API endpoint
    base_is_endpoint: bool,
}

impl TorznabAdapter {
    pub fn new(config: &IndexerConfig) -> Self {
        Self {
            indexer_name: config.name.clone(),
            categories: config.categories.clone(),
            base_is_endpoint: config.effective_base_url().contains("/api"),
        }
    }

    fn api_path(&self) -> String {
        if self.base_is_endpoint {
            String::new()
        } else {
            "api".to_string()
        }
    }

    fn base_spec(&self, search_type: &str) -> RequestSpec {
        let mut spec = RequestSpec::get(self.api_path());
        spec.params
            .push(("t".to_string(), search_type.to_string()));
        if matches!(search_type, "search" | "book") && !self.categories.is_empty() {
            spec.params
                .push(("cat".to_string(), self.categories.join(",")));
        }
        spec
    }

    fn parse_item(&self, item: &str) -> Option<SearchResult> {
        let title = extract_tag(item, "title").unwrap_or_default();
        let info_url = extract_tag(item, "comments");
        let guid = extract_tag(item, "guid").unwrap_or_default();
        let publish_date = extract_tag(item, "pubDate").map(|raw| normalize_date(&raw));

        let attrs = extract_attributes(item);

        let mut magnet_uri = None;
        let mut download_url = select_torrent_url(item);
        if download_url.is_none() {
            if let Some(info_hash) = attrs.get("infohash") {
                let trackers = split_trackers(
                    attrs
                        .get("tracker")
                        .or_else(|| attrs.get("trackers"))
                        .map(String::as_str),
                );
                let display_name = attrs
                    .get("dn")
                    .or_else(|| attrs.get("title"))
                    .cloned()
                    .unwrap_or_else(|| title.clone());
                magnet_uri = build_magnet(info_hash, &trackers, &display_name);
                download_url = magnet_uri.clone();
            }
        }
        let Some(download_url) = download_url else {
            tracing::debug!("Skipping '{}' - no .torrent URL present", title);
            return None;
        };

        let size_bytes = attrs
            .get("size")
            .and_then(|value| value.parse().ok())
            .or_else(|| extract_tag(item, "size").and_then(|value| value.parse().ok()))
            .or_else(|| extract_tag(item, "length").and_then(|value| value.parse().ok()))
            .unwrap_or(0);

        let seeders = attrs
            .get("seeders")
            .and_then(|value| value.parse().ok())
            .unwrap_or(-1);
        let peers = attrs
            .get("peers")
            .and_then(|value| value.parse().ok())
            .unwrap_or(-1);
        let category = attrs
            .get("category")
            .cloned()
            .unwrap_or_else(|| CATEGORY_AUDIOBOOK.to_string());

        let (title_format, title_bitrate) = extract_title_format(&title);
        let format = attrs
            .get("codec")
            .or_else(|| attrs.get("format"))
            .or_else(|| attrs.get("audioformat"))
            .or_else(|| attrs.get("encoding"))
            .map(|value| AudioFormat::parse(value))
            .filter(|format| *format != AudioFormat::Unknown)
            .unwrap_or(title_format);
        let bitrate_kbps = attrs
            .get("bitrate")
            .or_else(|| attrs.get("audio:bitrate"))
            .or_else(|| attrs.get("bitratekbps"))
            .or_else(|| attrs.get("audio_bitrate"))
            .and_then(|value| value.parse().ok())
            .filter(|kbps| *kbps > 0)
            .unwrap_or(title_bitrate);

        let author = attrs
            .get("author")
            .or_else(|| attrs.get("bookauthor"))
            .or_else(|| attrs.get("writer"))
            .cloned()
            .or_else(|| extract_author(&title));
        let narrator = attrs
            .get("narrator")
            .or_else(|| attrs.get("reader"))
            .cloned();
        let language = attrs.get("language").or_else(|| attrs.get("lang")).cloned();
        let series = attrs
            .get("series")
            .or_else(|| attrs.get("bookseries"))
            .cloned();
        let sequence = ["booknumber", "booknum", "seriesnumber", "volume", "issue", "sequence"]
            .iter()
            .find_map(|key| attrs.get(*key))
            .cloned();

        let mut result = SearchResult::new(title, download_url);
        result.indexer_name = self.indexer_name.clone();
        result.indexer_id = guid;
        result.author = author;
        result.narrator = narrator;
        result.series = series;
        result.sequence = sequence;
        result.language = language;
        result.format = format;
        result.bitrate_kbps = bitrate_kbps;
        result.size_bytes = size_bytes;
        result.seeders = seeders;
        result.peers = peers;
        result.protocol = Protocol::Torrent;
        result.category = category;
        result.publish_date = publish_date;
        result.info_url = info_url.filter(|url| !url.is_empty());
        result.info_hash = attrs.get("infohash").cloned();
        result.magnet_uri = magnet_uri.or_else(|| {
            attrs
                .get("magneturl")
                .filter(|url| url.starts_with("magnet:"))
                .cloned()
        });
        if !attrs.is_empty() {
            result.raw_attributes = Some(attrs);
        }

        Some(result)
    }
}

impl ProviderAdapter for TorznabAdapter {
    fn key(&self) -> &'static str {
        "torznab"
    }

    fn build_health_request(&self) -> Option<RequestSpec> {
        let mut spec = RequestSpec::get(self.api_path());
        spec.params.push(("t".to_string(), "caps".to_string()));
        Some(spec)
    }

    fn parse_health_response(&self, payload: &Payload) -> HealthReport {
        let text = payload.as_text().unwrap_or("");
        HealthReport {
            capabilities: parse_capabilities(text),
            version: "Torznab".to_string(),
        }
    }

    fn build_search_requests(&self, input: &SearchInput) -> Vec<RequestSpec> {
        let cleaned_query = clean_query(&input.query);
        let has_fields = !input.author.is_empty() || !input.title.is_empty();

        let mut spec;
        let q;
        if has_fields && input.supports_book_search {
            spec = self.base_spec("book");
            let combined = if cleaned_query.is_empty() {
                input.query.clone()
            } else {
                cleaned_query
            };
            q = combined;
        } else if has_fields {
            spec = self.base_spec("search");
            let combined = [&input.title, &input.author, &input.query]
                .iter()
                .filter(|part| !part.is_empty())
                .map(|part| part.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let cleaned = clean_query(&combined);
            q = if cleaned.is_empty() { combined } else { cleaned };
        } else {
            spec = self.base_spec("search");
            q = if cleaned_query.is_empty() {
                input.query.clone()
            } else {
                cleaned_query
            };
        }

        spec.params.push(("q".to_string(), q));
        if input.limit > 0 {
            spec.params
                .push(("limit".to_string(), input.limit.to_string()));
        }
        if input.offset > 0 {
            spec.params
                .push(("offset".to_string(), input.offset.to_string()));
        }

        vec![spec]
    }

    fn parse_search_results(&self, payload: &Payload) -> Vec<SearchResult> {
        let Some(text) = payload.as_text() else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for captures in ITEM_RE.captures_iter(text) {
            let item = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            match self.parse_item(item) {
                Some(result) if !result.title.is_empty() => results.push(result),
                _ => {}
            }
        }

        tracing::debug!(
            indexer = %self.indexer_name,
            count = results.len(),
            "Parsed torznab results"
        );
        results
    }
}

/// Extract content from an XML tag, handling CDATA and entities
fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let start_tag = format!("<{}>", tag);
    let end_tag = format!("</{}>", tag);

    let start = text.find(&start_tag)?;
    let content_start = start + start_tag.len();
    let end = text[content_start..].find(&end_tag)?;
    let content = &text[content_start..content_start + end];

    let content = if content.starts_with("<![CDATA[") && content.ends_with("]]>") {
        &content[9..content.len() - 3]
    } else {
        content
    };

    Some(html_escape::decode_html_entities(content).into_owned())
}

/// Collect `<torznab:attr name value/>` pairs, keys lowercased
fn extract_attributes(item: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for captures in TORZNAB_ATTR_RE.captures_iter(item) {
        let name = captures[1].to_lowercase();
        let value = html_escape::decode_html_entities(&captures[2]).into_owned();
        if !value.is_empty() {
            attrs.insert(name, value);
        }
    }
    attrs
}

/// Pick the .torrent URL: enclosure first (bittorrent type or .torrent path),
/// then the plain `<link>` if it passes the same predicate.
fn select_torrent_url(item: &str) -> Option<String> {
    if let Some(captures) = ENCLOSURE_RE.captures(item) {
        let mut url = String::new();
        let mut content_type = String::new();
        for attr in XML_ATTR_RE.captures_iter(&captures[1]) {
            match &attr[1] {
                "url" => url = html_escape::decode_html_entities(&attr[2]).into_owned(),
                "type" => content_type = attr[2].to_string(),
                _ => {}
            }
        }
        if is_torrent_url(&url, &content_type) {
            return Some(url);
        }
    }

    let link = extract_tag(item, "link")?;
    if is_torrent_url(&link, "") {
        return Some(link);
    }
    None
}

fn split_trackers(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    raw.split(['|', ',', ';'])
        .map(str::trim)
        .filter(|tracker| !tracker.is_empty())
        .map(String::from)
        .collect()
}

/// RFC 822 pubDate to ISO 8601; malformed dates pass through untouched
fn normalize_date(value: &str) -> String {
    chrono::DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|_| value.to_string())
}

/// Format and bitrate from bracketed title tokens: `[M4B]`, `[128 kbps]`,
/// `[M4B 64]`
fn extract_title_format(title: &str) -> (AudioFormat, u32) {
    if let Some(captures) = FORMAT_BITRATE_RE.captures(title) {
        let format = AudioFormat::parse(&captures[1]);
        let bitrate = captures[2].parse().unwrap_or(0);
        return (format, bitrate);
    }

    let format = FORMAT_RE
        .captures(title)
        .map(|captures| AudioFormat::parse(&captures[1]))
        .unwrap_or(AudioFormat::Unknown);
    let bitrate = BITRATE_RE
        .captures(title)
        .and_then(|captures| captures[1].parse().ok())
        .unwrap_or(0);
    (format, bitrate)
}

/// Guess the author from "Title - Author [" or "Title by Author" shapes
fn extract_author(title: &str) -> Option<String> {
    if let Some(captures) = AUTHOR_DASH_RE.captures(title) {
        let candidate = captures[1].trim().to_string();
        const BLOCKED: &[&str] = &[
            "progression",
            "fantasy",
            "litrpg",
            "epic",
            "series",
            "book",
            "volume",
            "vol",
            "audiobook",
            "unabridged",
        ];
        let lowered = candidate.to_lowercase();
        if candidate.len() < 50 && !BLOCKED.iter().any(|word| lowered.contains(word)) {
            return Some(candidate);
        }
    }

    AUTHOR_BY_RE
        .captures(title)
        .map(|captures| captures[1].trim().to_string())
}

/// Strip punctuation, stopwords, and short words from a free-text query
fn clean_query(query: &str) -> String {
    const STOPWORDS: &[&str] = &[
        "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from",
        "up", "out", "if", "about", "as", "into", "through", "over", "after", "before", "a",
        "an", "am", "is", "im", "its", "it",
    ];

    let cleaned = query.replace('\'', "");
    let cleaned = CLEAN_QUERY_RE.replace_all(&cleaned, " ");
    cleaned
        .split_whitespace()
        .filter(|word| word.len() > 2 && !STOPWORDS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when `<tag ... available="yes"` appears inside the searching block
fn search_mode_available(block: &str, tag: &str) -> bool {
    let pattern = format!("<{} ", tag);
    let Some(pos) = block.find(&pattern) else {
        return false;
    };
    let element = &block[pos..block[pos..]
        .find('>')
        .map(|end| pos + end)
        .unwrap_or(block.len())];
    element.contains(r#"available="yes""#)
}

fn parse_capabilities(text: &str) -> Capabilities {
    let mut caps = Capabilities::default();

    if let (Some(start), Some(end)) = (text.find("<searching>"), text.find("</searching>")) {
        let block = &text[start..end];
        caps.search_available = search_mode_available(block, "search");
        caps.book_search_available = search_mode_available(block, "book-search");
        caps.author_search_available = search_mode_available(block, "author-search");
    }

    for captures in CAPS_CATEGORY_RE.captures_iter(text) {
        caps.categories.push(CapabilityCategory {
            id: captures[1].to_string(),
            name: captures
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
        });
    }

    if let Some(start) = text.find("<limits") {
        let element = &text[start..text[start..]
            .find('>')
            .map(|end| start + end)
            .unwrap_or(text.len())];
        let mut limits = CapabilityLimits::default();
        for attr in XML_ATTR_RE.captures_iter(element) {
            match &attr[1] {
                "max" => limits.max = attr[2].parse().unwrap_or(100),
                "default" => limits.default = attr[2].parse().unwrap_or(100),
                _ => {}
            }
        }
        caps.limits = limits;
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> TorznabAdapter {
        TorznabAdapter {
            indexer_name: "Test Jackett".to_string(),
            categories: vec!["3030".to_string()],
            base_is_endpoint: true,
        }
    }

    fn item_payload(item_body: &str) -> Payload {
        Payload::Text(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
<channel><item>{}</item></channel></rss>"#,
            item_body
        ))
    }

    #[test]
    fn test_build_search_request_plain() {
        let input = SearchInput {
            query: "Mark of the Fool 8".to_string(),
            limit: 100,
            ..Default::default()
        };
        let specs = adapter().build_search_requests(&input);
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert!(spec.params.contains(&("t".to_string(), "search".to_string())));
        assert!(spec.params.contains(&("cat".to_string(), "3030".to_string())));
        // stopwords and short words removed
        assert!(spec.params.contains(&("q".to_string(), "Mark Fool".to_string())));
        assert!(spec.params.contains(&("limit".to_string(), "100".to_string())));
    }

    #[test]
    fn test_build_search_request_book_mode() {
        let input = SearchInput {
            query: "Anima Blake Crouch".to_string(),
            title: "Anima".to_string(),
            author: "Blake Crouch".to_string(),
            supports_book_search: true,
            ..Default::default()
        };
        let specs = adapter().build_search_requests(&input);
        assert!(specs[0]
            .params
            .contains(&("t".to_string(), "book".to_string())));
    }

    #[test]
    fn test_parse_item_with_enclosure() {
        let payload = item_payload(
            r#"<title>Mark of the Fool 8 [M4B 128]</title>
<guid>https://tracker.example/details/42</guid>
<comments>https://tracker.example/details/42</comments>
<pubDate>Sun, 06 Oct 2024 10:30:00 +0000</pubDate>
<link>https://tracker.example/details/42</link>
<enclosure url="https://tracker.example/x/file.torrent" length="891289600" type="application/x-bittorrent" />
<torznab:attr name="seeders" value="15" />
<torznab:attr name="peers" value="20" />
<torznab:attr name="author" value="J.M. Clarke" />
<torznab:attr name="category" value="3030" />"#,
        );

        let results = adapter().parse_search_results(&payload);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.title, "Mark of the Fool 8 [M4B 128]");
        assert_eq!(result.download_url, "https://tracker.example/x/file.torrent");
        assert_eq!(result.format, AudioFormat::M4b);
        assert_eq!(result.bitrate_kbps, 128);
        assert_eq!(result.size_bytes, 891289600);
        assert_eq!(result.seeders, 15);
        assert_eq!(result.peers, 20);
        assert_eq!(result.author.as_deref(), Some("J.M. Clarke"));
        assert_eq!(result.category, "3030");
        assert!(result.publish_date.as_deref().unwrap().starts_with("2024-10-06"));
        assert_eq!(result.indexer_name, "Test Jackett");
    }

    #[test]
    fn test_parse_item_magnet_fallback() {
        let payload = item_payload(
            r#"<title>Some Book [MP3]</title>
<guid>guid-1</guid>
<link>https://tracker.example/details/7</link>
<torznab:attr name="infohash" value="ABCDEF0123456789ABCDEF0123456789ABCDEF01" />
<torznab:attr name="tracker" value="udp://t.example:1337/announce|udp://t2.example:80/announce" />"#,
        );

        let results = adapter().parse_search_results(&payload);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.download_url.starts_with("magnet:?xt=urn:btih:abcdef01"));
        assert!(result.download_url.contains("tr=udp%3A%2F%2Ft.example%3A1337%2Fannounce"));
        assert!(result.download_url.contains("dn="));
        assert_eq!(result.format, AudioFormat::Mp3);
    }

    #[test]
    fn test_parse_item_dropped_without_torrent_or_hash() {
        let payload = item_payload(
            r#"<title>Orphan Result</title>
<guid>guid-2</guid>
<link>https://tracker.example/details/9</link>"#,
        );
        assert!(adapter().parse_search_results(&payload).is_empty());
    }

    #[test]
    fn test_extract_title_format_variants() {
        assert_eq!(
            extract_title_format("Book [M4B 64]"),
            (AudioFormat::M4b, 64)
        );
        assert_eq!(
            extract_title_format("Book [M4B] [128 kbps]"),
            (AudioFormat::M4b, 128)
        );
        assert_eq!(
            extract_title_format("Book (FLAC)"),
            (AudioFormat::Flac, 0)
        );
        assert_eq!(
            extract_title_format("Plain Title"),
            (AudioFormat::Unknown, 0)
        );
    }

    #[test]
    fn test_extract_author_heuristics() {
        assert_eq!(
            extract_author("Dungeon Crawler Carl - Matt Dinniman [M4B]").as_deref(),
            Some("Matt Dinniman")
        );
        assert_eq!(
            extract_author("The Hobbit by J.R.R. Tolkien").as_deref(),
            Some("J.R.R. Tolkien")
        );
        // genre words after the dash are not an author
        assert_eq!(extract_author("Big Saga - Epic Fantasy [M4B]"), None);
    }

    #[test]
    fn test_clean_query_stopwords() {
        assert_eq!(clean_query("The Name of the Wind"), "Name Wind");
        assert_eq!(clean_query("I'm Not the Hero"), "Not Hero");
        assert_eq!(clean_query(""), "");
    }

    #[test]
    fn test_parse_capabilities() {
        let xml = r#"<caps>
<limits max="200" default="50"/>
<searching>
  <search available="yes" supportedParams="q"/>
  <book-search available="yes" supportedParams="q,title,author"/>
  <author-search available="no" supportedParams="q"/>
</searching>
<categories>
  <category id="3000" name="Audio">
    <subcat id="3030" name="Audiobook"/>
  </category>
</categories>
</caps>"#;

        let caps = parse_capabilities(xml);
        assert!(caps.search_available);
        assert!(caps.book_search_available);
        assert!(!caps.author_search_available);
        assert_eq!(caps.limits.max, 200);
        assert_eq!(caps.limits.default, 50);
        assert_eq!(caps.categories.len(), 2);
        assert_eq!(caps.categories[1].id, "3030");
    }

    #[test]
    fn test_cdata_and_entities() {
        let payload = item_payload(
            r#"<title><![CDATA[Secrets &amp; Strife [M4B]]]></title>
<guid>g</guid>
<enclosure url="https://x.example/f.torrent" type="application/x-bittorrent" />"#,
        );
        let results = adapter().parse_search_results(&payload);
        assert_eq!(results[0].title, "Secrets & Strife [M4B]");
    }
}
