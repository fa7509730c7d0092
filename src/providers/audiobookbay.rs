//! AudiobookBay provider adapter
//!
//! ABB has no API, so discovery is a two-phase scrape: the search page (plus
//! page 2, since ABB shows few results per page) yields detail URLs, and each
//! detail page is parsed for the info hash, size, format, and trackers. The
//! site publishes no swarm stats, so seeders/peers are pinned to 1 and the
//! scorer gives these results an availability floor instead.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::config::IndexerConfig;
use crate::models::result::build_magnet;
use crate::models::{AudioFormat, Protocol, SearchResult};
use crate::utils::parse_size;

use super::{
    Capabilities, CapabilityCategory, CapabilityLimits, HealthReport, Payload, ProviderAdapter,
    RequestSpec, SearchInput,
};

static CLEAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W]+").unwrap());
static DOWNLOAD_HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)downld").unwrap());

/// Adapter scraping AudiobookBay search and detail pages
pub struct AudiobookBayAdapter {
    indexer_name: String,
    base_url: String,
}

impl AudiobookBayAdapter {
    pub fn new(config: &IndexerConfig) -> Self {
        Self {
            indexer_name: config.name.clone(),
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
        }
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        if let Ok(base) = url::Url::parse(&format!("{}/", self.base_url)) {
            if let Ok(resolved) = base.join(href) {
                return resolved.to_string();
            }
        }
        format!("{}/{}", self.base_url, href.trim_start_matches('/'))
    }

    fn parse_detail_page(&self, html: &str) -> Option<SearchResult> {
        let document = Html::parse_document(html);

        let title = select_text(&document, "div.postTitle h1")
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        let info_hash = extract_table_value(&document, "info hash");
        let size_bytes = extract_table_value(&document, "combined file size")
            .map(|text| parse_size(&text))
            .unwrap_or(0);

        let format = select_text(&document, "div.desc .format")
            .map(|text| AudioFormat::parse(&text))
            .unwrap_or(AudioFormat::Unknown);
        let author = select_text(&document, "div.desc .author").filter(|text| !text.is_empty());
        let category = select_text(&document, "div.postInfo a")
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "direct".to_string());

        let trackers = extract_trackers(&document);
        let torrent_url = extract_download_url(&document).map(|href| self.absolute(&href));
        let magnet_uri = info_hash
            .as_deref()
            .and_then(|hash| build_magnet(hash, &trackers, &title));

        // Nothing downloadable on this page: structural drift or a stub post
        let Some(download_url) = magnet_uri.clone().or_else(|| torrent_url.clone()) else {
            tracing::debug!(%title, "Dropping AudiobookBay page without info hash or torrent link");
            return None;
        };

        let info_url = select_attr(&document, r#"link[rel="canonical"]"#, "href")
            .map(|href| self.absolute(&href));
        let publish_date = select_attr(&document, r#"meta[itemprop="datePublished"]"#, "content");
        let cover_url = select_attr(&document, r#"div.postContent img[itemprop="image"]"#, "src")
            .map(|src| self.absolute(&src));

        let mut result = SearchResult::new(title, download_url);
        result.indexer_name = self.indexer_name.clone();
        result.indexer_id = info_hash
            .clone()
            .or_else(|| info_url.clone())
            .unwrap_or_default();
        result.author = author;
        result.format = format;
        result.bitrate_kbps = 0;
        result.size_bytes = size_bytes;
        result.seeders = 1;
        result.peers = 1;
        result.protocol = Protocol::Torrent;
        result.category = category;
        result.publish_date = publish_date;
        result.info_url = info_url;
        result.info_hash = info_hash;
        result.magnet_uri = magnet_uri;
        if let Some(cover) = cover_url {
            result.raw_attributes = Some(
                [("cover_url".to_string(), cover)]
                    .into_iter()
                    .collect(),
            );
        }

        Some(result)
    }
}

impl ProviderAdapter for AudiobookBayAdapter {
    fn key(&self) -> &'static str {
        "audiobookbay"
    }

    fn build_health_request(&self) -> Option<RequestSpec> {
        let mut spec = RequestSpec::get("/");
        spec.allow_missing = true;
        Some(spec)
    }

    fn parse_health_response(&self, _payload: &Payload) -> HealthReport {
        HealthReport {
            capabilities: Capabilities {
                search_available: true,
                book_search_available: true,
                author_search_available: true,
                categories: vec![CapabilityCategory {
                    id: "direct".to_string(),
                    name: "AudiobookBay".to_string(),
                }],
                limits: CapabilityLimits {
                    max: 30,
                    default: 20,
                },
            },
            version: "AudiobookBay".to_string(),
        }
    }

    fn build_search_requests(&self, input: &SearchInput) -> Vec<RequestSpec> {
        let focus = [&input.title, &input.author, &input.query]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let clean = CLEAN_RE
            .replace_all(&focus, " ")
            .trim()
            .to_lowercase();

        let params = vec![
            ("s".to_string(), clean),
            // tt=1 restricts matching to post titles
            ("tt".to_string(), "1".to_string()),
        ];

        let mut first = RequestSpec::get("/");
        first.params = params.clone();

        let mut second = RequestSpec::get("/page/2/");
        second.params = params;
        second.allow_missing = true;

        vec![first, second]
    }

    fn extract_detail_requests(&self, payload: &Payload) -> Vec<RequestSpec> {
        let Some(html) = payload.as_text() else {
            return Vec::new();
        };
        let document = Html::parse_document(html);

        let mut posts = select_all(&document, "div.post");
        if posts.is_empty() {
            posts = select_all(&document, "div.postTitle");
        }

        let (Ok(title_link_sel), Ok(any_link_sel)) =
            (Selector::parse("div.postTitle a"), Selector::parse("a"))
        else {
            return Vec::new();
        };

        let mut seen = std::collections::HashSet::new();
        let mut specs = Vec::new();
        for post in posts {
            let link = post
                .select(&title_link_sel)
                .next()
                .or_else(|| post.select(&any_link_sel).next());
            let Some(href) = link.and_then(|el| el.value().attr("href")) else {
                continue;
            };
            let detail_url = self.absolute(href);
            if seen.insert(detail_url.clone()) {
                specs.push(RequestSpec::get(detail_url));
            }
        }
        specs
    }

    fn parse_search_results(&self, payload: &Payload) -> Vec<SearchResult> {
        let Some(html) = payload.as_text() else {
            return Vec::new();
        };
        self.parse_detail_page(html).into_iter().collect()
    }
}

fn select_all<'a>(document: &'a Html, selector: &str) -> Vec<scraper::ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(sel) => document.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read the value cell next to a labelled cell in the torrent info table
fn extract_table_value(document: &Html, label: &str) -> Option<String> {
    let sel = Selector::parse("table.torrent_info td").ok()?;
    let cells: Vec<_> = document.select(&sel).collect();
    for (idx, cell) in cells.iter().enumerate() {
        let text = cell.text().collect::<String>().to_lowercase();
        if text.contains(label) {
            if let Some(sibling) = cells.get(idx + 1) {
                let value = sibling
                    .text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn extract_trackers(document: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse("table.torrent_info td") else {
        return Vec::new();
    };
    let cells: Vec<_> = document.select(&sel).collect();
    let mut trackers = Vec::new();
    for (idx, cell) in cells.iter().enumerate() {
        let text = cell.text().collect::<String>().trim().to_lowercase();
        if text.starts_with("tracker") || text.starts_with("announce") {
            if let Some(sibling) = cells.get(idx + 1) {
                let tracker = sibling.text().collect::<String>().trim().to_string();
                if !tracker.is_empty() {
                    trackers.push(tracker);
                }
            }
        }
    }
    trackers
}

fn extract_download_url(document: &Html) -> Option<String> {
    let sel = Selector::parse("a").ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .find(|href| DOWNLOAD_HREF_RE.is_match(href))
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> AudiobookBayAdapter {
        let mut config: IndexerConfig = toml::from_str(
            r#"
            name = "AudiobookBay"
            enabled = true
            type = "direct"
            base_url = "https://audiobookbay.lu"
            session_id = "unused"
            "#,
        )
        .unwrap();
        config.key = "abb".to_string();
        AudiobookBayAdapter::new(&config)
    }

    const SEARCH_PAGE: &str = r#"<html><body>
<div class="post">
  <div class="postTitle"><h2><a href="/abss/mark-of-the-fool-8/">Mark of the Fool 8</a></h2></div>
</div>
<div class="post">
  <div class="postTitle"><h2><a href="/abss/other-book/">Other Book</a></h2></div>
</div>
<div class="post">
  <div class="postTitle"><h2><a href="/abss/mark-of-the-fool-8/">Mark of the Fool 8 (dup)</a></h2></div>
</div>
</body></html>"#;

    const DETAIL_PAGE: &str = r#"<html><head>
<link rel="canonical" href="/abss/mark-of-the-fool-8/"/>
<meta itemprop="datePublished" content="2024-10-06"/>
</head><body>
<div class="postTitle"><h1>Mark of the Fool 8</h1></div>
<div class="postInfo"><a href="/cat/fantasy">Fantasy</a></div>
<div class="postContent"><img itemprop="image" src="/covers/fool8.jpg"/></div>
<div class="desc">
  <span class="format">M4B</span>
  <span class="author">J.M. Clarke</span>
</div>
<table class="torrent_info">
<tr><td>Info Hash:</td><td>ABCDEF0123456789ABCDEF0123456789ABCDEF01</td></tr>
<tr><td>Tracker:</td><td>udp://tracker.example:1337/announce</td></tr>
<tr><td>Announce URL:</td><td>udp://backup.example:80/announce</td></tr>
<tr><td>Combined File Size:</td><td>850 MB</td></tr>
</table>
<a href="/downld/12345">Download torrent</a>
</body></html>"#;

    #[test]
    fn test_build_search_requests_two_pages() {
        let input = SearchInput {
            title: "Mark of the Fool 8!".to_string(),
            ..Default::default()
        };
        let specs = adapter().build_search_requests(&input);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].path, "/");
        assert_eq!(specs[1].path, "/page/2/");
        assert!(specs[1].allow_missing);
        assert!(specs[0]
            .params
            .contains(&("s".to_string(), "mark of the fool 8".to_string())));
        assert!(specs[0]
            .params
            .contains(&("tt".to_string(), "1".to_string())));
    }

    #[test]
    fn test_extract_detail_requests_unique() {
        let payload = Payload::Text(SEARCH_PAGE.to_string());
        let specs = adapter().extract_detail_requests(&payload);
        assert_eq!(specs.len(), 2);
        assert_eq!(
            specs[0].path,
            "https://audiobookbay.lu/abss/mark-of-the-fool-8/"
        );
        assert_eq!(specs[1].path, "https://audiobookbay.lu/abss/other-book/");
    }

    #[test]
    fn test_parse_detail_page() {
        let payload = Payload::Text(DETAIL_PAGE.to_string());
        let results = adapter().parse_search_results(&payload);
        assert_eq!(results.len(), 1);
        let result = &results[0];

        assert_eq!(result.title, "Mark of the Fool 8");
        assert_eq!(result.author.as_deref(), Some("J.M. Clarke"));
        assert_eq!(result.format, AudioFormat::M4b);
        assert_eq!(result.size_bytes, 850 * 1024 * 1024);
        assert_eq!(result.seeders, 1);
        assert_eq!(result.peers, 1);
        assert_eq!(result.category, "Fantasy");
        assert_eq!(
            result.info_hash.as_deref(),
            Some("ABCDEF0123456789ABCDEF0123456789ABCDEF01")
        );

        let magnet = result.magnet_uri.as_deref().unwrap();
        assert!(magnet.starts_with("magnet:?xt=urn:btih:abcdef0123456789abcdef0123456789abcdef01"));
        assert!(magnet.contains("dn=Mark%20of%20the%20Fool%208"));
        assert!(magnet.contains("tr=udp%3A%2F%2Ftracker.example%3A1337%2Fannounce"));
        assert!(magnet.contains("tr=udp%3A%2F%2Fbackup.example%3A80%2Fannounce"));
        assert_eq!(result.download_url, magnet);

        assert_eq!(
            result.info_url.as_deref(),
            Some("https://audiobookbay.lu/abss/mark-of-the-fool-8/")
        );
        assert_eq!(result.publish_date.as_deref(), Some("2024-10-06"));
        assert_eq!(
            result
                .raw_attributes
                .as_ref()
                .and_then(|attrs| attrs.get("cover_url"))
                .map(String::as_str),
            Some("https://audiobookbay.lu/covers/fool8.jpg")
        );
    }

    #[test]
    fn test_detail_page_without_hash_or_link_dropped() {
        let payload = Payload::Text(
            r#"<html><body><div class="postTitle"><h1>Stub</h1></div></body></html>"#.to_string(),
        );
        assert!(adapter().parse_search_results(&payload).is_empty());
    }

    #[test]
    fn test_detail_page_with_only_torrent_link() {
        let payload = Payload::Text(
            r#"<html><body>
<div class="postTitle"><h1>Linked Only</h1></div>
<a href="/downld/99">get</a>
</body></html>"#
                .to_string(),
        );
        let results = adapter().parse_search_results(&payload);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].download_url, "https://audiobookbay.lu/downld/99");
        assert!(results[0].magnet_uri.is_none());
    }
}
