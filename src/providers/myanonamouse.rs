//! MyAnonamouse provider adapter
//!
//! Speaks the site's JSON search endpoint
//! (`/tor/js/loadSearchJSONbasic.php`) with its indexed repeated parameters.
//! The session identity itself is injected by the indexer; this adapter only
//! shapes requests and filters the response down to audio entries.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::IndexerConfig;
use crate::models::{AudioFormat, Protocol, SearchResult};
use crate::utils::parse_size;

use super::{
    Capabilities, CapabilityCategory, CapabilityLimits, HealthReport, Payload, ProviderAdapter,
    RequestSpec, SearchInput,
};

const SEARCH_PATH: &str = "/tor/js/loadSearchJSONbasic.php";

/// MAM main category for audiobooks
const MAIN_CAT_AUDIOBOOKS: &str = "13";
/// MAM main category for e-books
const MAIN_CAT_EBOOKS: &str = "14";

const AUDIO_FILETYPES: &[&str] = &["m4b", "mp3", "flac", "aac", "ogg", "m4a", "wav"];
const EBOOK_FILETYPES: &[&str] = &["epub", "pdf", "mobi", "azw", "azw3", "cbz", "cbr"];
const EBOOK_INDICATORS: &[&str] = &[
    "ebook",
    "epub",
    "pdf",
    "mobi",
    "azw",
    "azw3",
    "ebookcollection",
    "e-book",
];

const VALID_SEARCH_TYPES: &[&str] = &[
    "all", "active", "inactive", "fl", "fl-vip", "vip", "nvip", "nmeta",
];

static SANITIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").unwrap());

/// Adapter for the MyAnonamouse JSON search API
pub struct MyAnonamouseAdapter {
    indexer_name: String,
    base_url: String,
    search_type: String,
    languages: Vec<String>,
    /// Tracker-native category ids sent with the request
    request_categories: Vec<String>,
    /// Main categories (13/14) the post-filter accepts; empty = allow all
    allowed_main_categories: Vec<String>,
}

impl MyAnonamouseAdapter {
    pub fn new(config: &IndexerConfig) -> Self {
        let raw_values: Vec<String> = config
            .categories
            .iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();
        let explicit_all = raw_values.iter().any(|value| value == "0");

        let mut request_categories = compute_request_categories(&raw_values);
        if explicit_all || request_categories.is_empty() {
            request_categories.clear();
        }

        let allowed_main_categories = if explicit_all {
            Vec::new()
        } else {
            compute_allowed_main_categories(&raw_values)
        };

        let search_type = config
            .search_type
            .as_deref()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| VALID_SEARCH_TYPES.contains(&value.as_str()))
            .unwrap_or_else(|| "all".to_string());

        Self {
            indexer_name: config.name.clone(),
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
            search_type,
            languages: config.languages.clone(),
            request_categories,
            allowed_main_categories,
        }
    }

    fn normalize_entry(&self, entry: &Value) -> Option<SearchResult> {
        let torrent_id = entry
            .get("id")
            .or_else(|| entry.get("tid"))
            .or_else(|| entry.get("torrent_id"))
            .map(json_to_string)
            .filter(|id| !id.is_empty())?;

        let main_cat = resolve_entry_main_cat(entry);
        if !self.allowed_main_categories.is_empty() {
            match &main_cat {
                Some(cat) if self.allowed_main_categories.contains(cat) => {}
                _ => {
                    tracing::debug!(id = %torrent_id, ?main_cat, "Dropping entry: main_cat not allowed");
                    return None;
                }
            }
        }

        let filetype = entry
            .get("filetype")
            .map(json_to_string)
            .unwrap_or_default()
            .to_lowercase();
        if EBOOK_FILETYPES.contains(&filetype.as_str()) {
            tracing::debug!(id = %torrent_id, %filetype, "Dropping entry: ebook filetype");
            return None;
        }

        // mediatype 2 means e-book on MAM
        if entry.get("mediatype").map(json_to_string).as_deref() == Some("2") {
            tracing::debug!(id = %torrent_id, "Dropping entry: mediatype indicates ebook");
            return None;
        }

        if main_cat.as_deref() == Some(MAIN_CAT_EBOOKS) {
            tracing::debug!(id = %torrent_id, "Dropping entry: main_cat is ebooks");
            return None;
        }

        let title = entry
            .get("title")
            .or_else(|| entry.get("name"))
            .map(json_to_string)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        if !AUDIO_FILETYPES.contains(&filetype.as_str()) {
            let title_lower = title.to_lowercase();
            let tags_lower = entry
                .get("tags")
                .map(json_to_string)
                .unwrap_or_default()
                .to_lowercase();
            if EBOOK_INDICATORS
                .iter()
                .any(|term| title_lower.contains(term) || tags_lower.contains(term))
            {
                tracing::debug!(id = %torrent_id, "Dropping entry: title/tags indicate ebook");
                return None;
            }
        }

        let size_bytes = entry
            .get("size")
            .or_else(|| entry.get("size_bytes"))
            .map(|value| match value {
                Value::Number(n) => n.as_u64().unwrap_or(0),
                Value::String(s) => parse_size(s),
                _ => 0,
            })
            .unwrap_or(0);

        let authors = extract_people_list(entry.get("author_info"));
        let narrators = extract_people_list(entry.get("narrator_info"));
        let (series, sequence) = extract_series(entry.get("series_info"));

        let mut result = SearchResult::new(
            title,
            format!("{}/tor/download.php?tid={}", self.base_url, torrent_id),
        );
        result.indexer_name = self.indexer_name.clone();
        result.indexer_id = torrent_id.clone();
        result.author = (!authors.is_empty()).then(|| authors.join(", "));
        result.narrator = (!narrators.is_empty()).then(|| narrators.join(", "));
        result.series = series;
        result.sequence = sequence;
        result.language = entry
            .get("lang_code")
            .map(json_to_string)
            .filter(|lang| !lang.is_empty());
        result.format = AudioFormat::parse(&filetype);
        result.bitrate_kbps = 0;
        result.size_bytes = size_bytes;
        result.seeders = json_to_i64(entry.get("seeders"), -1);
        result.peers = json_to_i64(entry.get("leechers"), -1);
        result.protocol = Protocol::Torrent;
        result.category = entry
            .get("category")
            .or_else(|| entry.get("main_cat"))
            .map(json_to_string)
            .filter(|cat| !cat.is_empty())
            .unwrap_or_else(|| MAIN_CAT_AUDIOBOOKS.to_string());
        result.publish_date = entry
            .get("added")
            .map(json_to_string)
            .filter(|date| !date.is_empty());
        result.info_url = Some(format!("{}/t/{}", self.base_url, torrent_id));

        Some(result)
    }
}

impl ProviderAdapter for MyAnonamouseAdapter {
    fn key(&self) -> &'static str {
        "myanonamouse"
    }

    fn build_health_request(&self) -> Option<RequestSpec> {
        let input = SearchInput {
            query: "healthcheck".to_string(),
            limit: 1,
            ..Default::default()
        };
        self.build_search_requests(&input).into_iter().next()
    }

    fn parse_health_response(&self, _payload: &Payload) -> HealthReport {
        HealthReport {
            capabilities: Capabilities {
                search_available: true,
                book_search_available: true,
                author_search_available: true,
                categories: vec![
                    CapabilityCategory {
                        id: MAIN_CAT_AUDIOBOOKS.to_string(),
                        name: "Audiobooks".to_string(),
                    },
                    CapabilityCategory {
                        id: MAIN_CAT_EBOOKS.to_string(),
                        name: "E-Books".to_string(),
                    },
                ],
                limits: CapabilityLimits {
                    max: 1000,
                    default: 50,
                },
            },
            version: "MyAnonamouse".to_string(),
        }
    }

    fn build_search_requests(&self, input: &SearchInput) -> Vec<RequestSpec> {
        let mut parts = Vec::new();
        if !input.title.is_empty() {
            parts.push(input.title.as_str());
        }
        if !input.author.is_empty() {
            parts.push(input.author.as_str());
        }
        if parts.is_empty() && !input.query.is_empty() {
            parts.push(input.query.as_str());
        }

        let focus = parts.join(" ");
        let clean = SANITIZE_RE.replace_all(&focus, " ").trim().to_string();
        let text = if clean.is_empty() { "*".to_string() } else { clean };

        let mut spec = RequestSpec::get(SEARCH_PATH);
        spec.expects_json = true;
        spec.headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];

        let push = |params: &mut Vec<(String, String)>, key: &str, value: String| {
            params.push((key.to_string(), value));
        };

        push(&mut spec.params, "tor[text]", text);
        push(&mut spec.params, "tor[searchType]", self.search_type.clone());
        push(&mut spec.params, "tor[searchIn]", "torrents".to_string());
        push(&mut spec.params, "tor[sortType]", "default".to_string());
        push(
            &mut spec.params,
            "tor[perpage]",
            input.limit.clamp(5, 1000).to_string(),
        );
        push(&mut spec.params, "tor[startNumber]", input.offset.to_string());
        push(&mut spec.params, "tor[browseStart]", "true".to_string());
        push(
            &mut spec.params,
            "tor[browseFlagsHideVsShow]",
            "0".to_string(),
        );
        push(&mut spec.params, "thumbnails", "1".to_string());
        push(&mut spec.params, "description", "1".to_string());
        push(&mut spec.params, "mediaInfo", "set".to_string());
        push(&mut spec.params, "dlLink", String::new());

        for field in ["title", "author", "narrator", "series", "description", "filenames"] {
            push(
                &mut spec.params,
                &format!("tor[srchIn][{field}]"),
                "true".to_string(),
            );
        }

        if self.request_categories.is_empty() {
            push(&mut spec.params, "tor[cat][0]", "0".to_string());
        } else {
            for (idx, cat) in self.request_categories.iter().enumerate() {
                push(&mut spec.params, &format!("tor[cat][{idx}]"), cat.clone());
            }
        }

        for (idx, lang) in self
            .languages
            .iter()
            .filter(|lang| !lang.is_empty())
            .enumerate()
        {
            push(
                &mut spec.params,
                &format!("tor[browse_lang][{idx}]"),
                lang.clone(),
            );
        }

        vec![spec]
    }

    fn parse_search_results(&self, payload: &Payload) -> Vec<SearchResult> {
        let Some(json) = payload.as_json() else {
            tracing::debug!("MyAnonamouse payload was not JSON");
            return Vec::new();
        };
        let Some(entries) = json.get("data").and_then(Value::as_array) else {
            tracing::debug!("MyAnonamouse payload missing 'data' array");
            return Vec::new();
        };

        let results: Vec<SearchResult> = entries
            .iter()
            .filter_map(|entry| self.normalize_entry(entry))
            .collect();

        tracing::debug!(
            indexer = %self.indexer_name,
            raw = entries.len(),
            kept = results.len(),
            "Parsed MyAnonamouse results"
        );
        results
    }
}

fn json_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn json_to_i64(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// `author_info`/`narrator_info` are JSON-encoded `{id: name}` maps
fn extract_people_list(blob: Option<&Value>) -> Vec<String> {
    let Some(Value::String(raw)) = blob else {
        return Vec::new();
    };
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    map.values()
        .filter_map(|value| match value {
            Value::String(name) if !name.is_empty() => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// `series_info` is a JSON-encoded map of `{id: [name, sequence]}`
fn extract_series(blob: Option<&Value>) -> (Option<String>, Option<String>) {
    let Some(Value::String(raw)) = blob else {
        return (None, None);
    };
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
        return (None, None);
    };
    for value in map.values() {
        if let Value::Array(parts) = value {
            if let Some(name) = parts.first().map(json_to_string).filter(|n| !n.is_empty()) {
                let sequence = parts.get(1).map(json_to_string).filter(|s| !s.is_empty());
                return (Some(name), sequence);
            }
        }
    }
    (None, None)
}

/// Sub-1000 numeric entries are tracker-native category ids
fn compute_request_categories(raw_values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw_values
        .iter()
        .filter(|value| value.as_str() != "0")
        .filter_map(|value| value.parse::<u32>().ok())
        .filter(|num| (1..1000).contains(num))
        .map(|num| num.to_string())
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Map configured category values onto MAM main categories (13 audio, 14
/// ebook) for post-filter enforcement. Torznab audio buckets are 3xxx, ebook
/// buckets 7xxx. Defaults to audiobooks when nothing maps.
fn compute_allowed_main_categories(raw_values: &[String]) -> Vec<String> {
    if raw_values.is_empty() {
        return vec![MAIN_CAT_AUDIOBOOKS.to_string()];
    }

    let mut mapped: Vec<String> = raw_values
        .iter()
        .filter(|value| value.as_str() != "0")
        .filter_map(|value| map_category_to_main(value))
        .collect();
    mapped.sort();
    mapped.dedup();

    if mapped.is_empty() {
        vec![MAIN_CAT_AUDIOBOOKS.to_string()]
    } else {
        mapped
    }
}

fn map_category_to_main(value: &str) -> Option<String> {
    let num: u32 = value.parse().ok()?;
    match num {
        3000..=3999 => Some(MAIN_CAT_AUDIOBOOKS.to_string()),
        7000..=7999 => Some(MAIN_CAT_EBOOKS.to_string()),
        13 | 14 => Some(num.to_string()),
        _ => None,
    }
}

fn resolve_entry_main_cat(entry: &Value) -> Option<String> {
    for key in ["main_cat", "maincat", "mainCategory"] {
        if let Some(value) = entry.get(key) {
            let text = json_to_string(value);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    match entry.get("mediatype").map(json_to_string).as_deref() {
        Some("1") => return Some(MAIN_CAT_AUDIOBOOKS.to_string()),
        Some("2") => return Some(MAIN_CAT_EBOOKS.to_string()),
        _ => {}
    }

    let filetype = entry
        .get("filetype")
        .map(json_to_string)
        .unwrap_or_default()
        .to_lowercase();
    if AUDIO_FILETYPES.contains(&filetype.as_str()) {
        Some(MAIN_CAT_AUDIOBOOKS.to_string())
    } else if EBOOK_FILETYPES.contains(&filetype.as_str()) {
        Some(MAIN_CAT_EBOOKS.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter_with_categories(categories: &[&str]) -> MyAnonamouseAdapter {
        let mut config: IndexerConfig = toml::from_str(
            r#"
            name = "MyAnonamouse"
            enabled = true
            type = "direct"
            base_url = "https://www.myanonamouse.net"
            session_id = "sid"
            "#,
        )
        .unwrap();
        config.key = "mam".to_string();
        config.categories = categories.iter().map(|s| s.to_string()).collect();
        config.languages = vec!["1".to_string()];
        MyAnonamouseAdapter::new(&config)
    }

    fn audio_entry() -> Value {
        json!({
            "id": 4242,
            "title": "Mark of the Fool 8",
            "author_info": "{\"101\":\"J.M. Clarke\"}",
            "narrator_info": "{\"55\":\"Travis Baldree\"}",
            "series_info": "{\"9\":[\"Mark of the Fool\",\"8\"]}",
            "filetype": "m4b",
            "size": "850 MB",
            "seeders": 12,
            "leechers": 3,
            "added": "2024-10-06 10:30:00",
            "lang_code": "ENG",
            "main_cat": "13",
            "mediatype": 1
        })
    }

    #[test]
    fn test_build_search_request_params() {
        let adapter = adapter_with_categories(&["3030"]);
        let input = SearchInput {
            query: String::new(),
            title: "Mark of the Fool 8".to_string(),
            author: "J.M. Clarke".to_string(),
            limit: 50,
            offset: 0,
            supports_book_search: true,
        };

        let specs = adapter.build_search_requests(&input);
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.path, SEARCH_PATH);
        assert!(spec.expects_json);
        assert!(spec
            .params
            .contains(&("tor[text]".to_string(), "Mark of the Fool 8 J M Clarke".to_string())));
        assert!(spec
            .params
            .contains(&("tor[srchIn][narrator]".to_string(), "true".to_string())));
        assert!(spec
            .params
            .contains(&("tor[perpage]".to_string(), "50".to_string())));
        assert!(spec
            .params
            .contains(&("tor[browse_lang][0]".to_string(), "1".to_string())));
        // 3030 is a torznab code, not a tracker id, so the request carries cat 0
        assert!(spec
            .params
            .contains(&("tor[cat][0]".to_string(), "0".to_string())));
    }

    #[test]
    fn test_empty_search_text_becomes_wildcard() {
        let adapter = adapter_with_categories(&[]);
        let specs = adapter.build_search_requests(&SearchInput::default());
        assert!(specs[0]
            .params
            .contains(&("tor[text]".to_string(), "*".to_string())));
    }

    #[test]
    fn test_tracker_native_categories_are_forwarded() {
        let adapter = adapter_with_categories(&["39", "49"]);
        let specs = adapter.build_search_requests(&SearchInput::default());
        assert!(specs[0]
            .params
            .contains(&("tor[cat][0]".to_string(), "39".to_string())));
        assert!(specs[0]
            .params
            .contains(&("tor[cat][1]".to_string(), "49".to_string())));
    }

    #[test]
    fn test_parse_entry_fields() {
        let adapter = adapter_with_categories(&["3030"]);
        let payload = Payload::Json(json!({"data": [audio_entry()], "total": 1}));

        let results = adapter.parse_search_results(&payload);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.title, "Mark of the Fool 8");
        assert_eq!(result.author.as_deref(), Some("J.M. Clarke"));
        assert_eq!(result.narrator.as_deref(), Some("Travis Baldree"));
        assert_eq!(result.series.as_deref(), Some("Mark of the Fool"));
        assert_eq!(result.sequence.as_deref(), Some("8"));
        assert_eq!(result.format, AudioFormat::M4b);
        assert_eq!(result.size_bytes, 850 * 1024 * 1024);
        assert_eq!(result.seeders, 12);
        assert_eq!(result.peers, 3);
        assert_eq!(
            result.download_url,
            "https://www.myanonamouse.net/tor/download.php?tid=4242"
        );
        assert_eq!(
            result.info_url.as_deref(),
            Some("https://www.myanonamouse.net/t/4242")
        );
    }

    #[test]
    fn test_ebook_entries_are_dropped() {
        let adapter = adapter_with_categories(&["3030"]);

        let mut by_filetype = audio_entry();
        by_filetype["filetype"] = json!("epub");
        let mut by_mediatype = audio_entry();
        by_mediatype["mediatype"] = json!(2);
        by_mediatype["main_cat"] = json!("13");
        let mut by_main_cat = audio_entry();
        by_main_cat["main_cat"] = json!("14");
        let mut by_title = audio_entry();
        by_title["filetype"] = json!("");
        by_title["title"] = json!("Huge eBook Collection");

        let payload = Payload::Json(json!({
            "data": [by_filetype, by_mediatype, by_main_cat, by_title, audio_entry()]
        }));
        let results = adapter.parse_search_results(&payload);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Mark of the Fool 8");
    }

    #[test]
    fn test_main_cat_allow_list_enforced() {
        // config maps 7020 -> ebooks only; the audio entry must be dropped
        let adapter = adapter_with_categories(&["7020"]);
        assert_eq!(adapter.allowed_main_categories, vec!["14"]);

        let payload = Payload::Json(json!({"data": [audio_entry()]}));
        assert!(adapter.parse_search_results(&payload).is_empty());
    }

    #[test]
    fn test_category_zero_allows_everything() {
        let adapter = adapter_with_categories(&["0"]);
        assert!(adapter.allowed_main_categories.is_empty());
        assert!(adapter.request_categories.is_empty());
    }

    #[test]
    fn test_entry_without_id_is_dropped() {
        let adapter = adapter_with_categories(&[]);
        let payload = Payload::Json(json!({"data": [{"title": "No Id"}]}));
        assert!(adapter.parse_search_results(&payload).is_empty());
    }

    #[test]
    fn test_size_as_raw_bytes() {
        let adapter = adapter_with_categories(&[]);
        let mut entry = audio_entry();
        entry["size"] = json!(123456789);
        let payload = Payload::Json(json!({"data": [entry]}));
        let results = adapter.parse_search_results(&payload);
        assert_eq!(results[0].size_bytes, 123456789);
    }
}
