//! Generic JSON direct provider adapter
//!
//! Fallback for direct providers without a dedicated adapter. Expects a
//! `{"results": [...]}` payload with loosely named fields.

use serde_json::Value;

use crate::config::IndexerConfig;
use crate::models::{AudioFormat, Protocol, SearchResult};

use super::{
    Capabilities, CapabilityCategory, HealthReport, Payload, ProviderAdapter, RequestSpec,
    SearchInput,
};

const DEFAULT_SEARCH_PATH: &str = "/api/direct/search";
const DEFAULT_HEALTH_PATH: &str = "/api/direct/health";

pub struct GenericJsonAdapter {
    indexer_name: String,
}

impl GenericJsonAdapter {
    pub fn new(config: &IndexerConfig) -> Self {
        Self {
            indexer_name: config.name.clone(),
        }
    }

    fn normalize_result(&self, entry: &Value) -> Option<SearchResult> {
        let download_url = ["download_url", "url", "link"]
            .iter()
            .find_map(|key| entry.get(*key))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())?;

        let title = ["title", "name"]
            .iter()
            .find_map(|key| entry.get(*key))
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .unwrap_or("Unknown");

        let size_bytes = ["size_bytes", "size", "filesize"]
            .iter()
            .find_map(|key| entry.get(*key))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        let mut result = SearchResult::new(title, download_url);
        result.indexer_name = self.indexer_name.clone();
        result.indexer_id = ["id", "guid", "hash"]
            .iter()
            .find_map(|key| entry.get(*key))
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        result.author = string_field(entry, "author");
        result.narrator = string_field(entry, "narrator");
        result.series = string_field(entry, "series");
        result.sequence = string_field(entry, "sequence").or_else(|| string_field(entry, "series_index"));
        result.language = string_field(entry, "language");
        result.format = string_field(entry, "format")
            .or_else(|| string_field(entry, "extension"))
            .map(|value| AudioFormat::parse(&value))
            .unwrap_or(AudioFormat::Unknown);
        result.bitrate_kbps = entry
            .get("bitrate")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        result.size_bytes = size_bytes;
        result.seeders = entry.get("seeders").and_then(Value::as_i64).unwrap_or(-1);
        result.peers = entry.get("peers").and_then(Value::as_i64).unwrap_or(-1);
        result.protocol = Protocol::Direct;
        result.category = string_field(entry, "category").unwrap_or_else(|| "direct".to_string());
        result.publish_date = string_field(entry, "publish_date")
            .or_else(|| string_field(entry, "published"))
            .or_else(|| string_field(entry, "time"));
        result.info_url = string_field(entry, "info_url")
            .or_else(|| string_field(entry, "details"))
            .or_else(|| string_field(entry, "detail_url"));

        Some(result)
    }
}

impl ProviderAdapter for GenericJsonAdapter {
    fn key(&self) -> &'static str {
        "generic"
    }

    fn build_health_request(&self) -> Option<RequestSpec> {
        let mut spec = RequestSpec::get(DEFAULT_HEALTH_PATH);
        spec.expects_json = true;
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
                    name: "Direct Provider".to_string(),
                }],
                limits: Default::default(),
            },
            version: self.indexer_name.clone(),
        }
    }

    fn build_search_requests(&self, input: &SearchInput) -> Vec<RequestSpec> {
        let mut spec = RequestSpec::get(DEFAULT_SEARCH_PATH);
        spec.expects_json = true;
        spec.params = vec![
            ("q".to_string(), input.query.trim().to_string()),
            ("title".to_string(), input.title.trim().to_string()),
            ("author".to_string(), input.author.trim().to_string()),
            ("limit".to_string(), input.limit.clamp(1, 200).to_string()),
            ("offset".to_string(), input.offset.to_string()),
        ];
        vec![spec]
    }

    fn parse_search_results(&self, payload: &Payload) -> Vec<SearchResult> {
        let Some(entries) = payload
            .as_json()
            .and_then(|json| json.get("results"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| self.normalize_result(entry))
            .collect()
    }
}

fn string_field(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}
