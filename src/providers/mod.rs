//! Provider adapters
//!
//! An adapter encapsulates one provider's wire protocol: it builds request
//! specs and parses response payloads into normalized [`SearchResult`]s.
//! Adapters never perform I/O; the indexer executes the specs and feeds the
//! payloads back in. Two-phase providers (AudiobookBay) hand the indexer a
//! list of follow-up detail requests via [`ProviderAdapter::extract_detail_requests`].

pub mod audiobookbay;
pub mod generic;
pub mod myanonamouse;
pub mod torznab;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::IndexerConfig;
use crate::models::SearchResult;

pub use audiobookbay::AudiobookBayAdapter;
pub use generic::GenericJsonAdapter;
pub use myanonamouse::MyAnonamouseAdapter;
pub use torznab::TorznabAdapter;

/// HTTP method for a request spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

/// Description of an HTTP request the indexer should perform on behalf of an
/// adapter. `path` is joined onto the indexer's base URL unless absolute.
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    /// Ordered pairs; repeated keys are allowed (MyAnonamouse indexed params)
    pub params: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub expects_json: bool,
    /// A 404 yields an empty payload instead of an error
    pub allow_missing: bool,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Response body handed back to an adapter
#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
    Empty,
}

impl Payload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One category a provider can search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityCategory {
    pub id: String,
    pub name: String,
}

/// Result-count limits advertised by a provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityLimits {
    pub max: u32,
    pub default: u32,
}

impl Default for CapabilityLimits {
    fn default() -> Self {
        Self {
            max: 100,
            default: 100,
        }
    }
}

/// What a provider supports, discovered lazily by the health check
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub search_available: bool,
    pub book_search_available: bool,
    pub author_search_available: bool,
    #[serde(default)]
    pub categories: Vec<CapabilityCategory>,
    #[serde(default)]
    pub limits: CapabilityLimits,
}

/// Outcome of parsing a health-check response
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub capabilities: Capabilities,
    pub version: String,
}

/// Inputs to search-request building. `supports_book_search` reflects the
/// indexer's cached capabilities so Torznab can pick `t=book` over `t=search`.
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
    pub query: String,
    pub author: String,
    pub title: String,
    pub limit: u32,
    pub offset: u32,
    pub supports_book_search: bool,
}

/// Provider-specific request builder + response parser pair. No I/O.
pub trait ProviderAdapter: Send + Sync {
    fn key(&self) -> &'static str;

    /// Request spec for the provider health ping; `None` skips the ping and
    /// the connection test succeeds with default capabilities.
    fn build_health_request(&self) -> Option<RequestSpec>;

    fn parse_health_response(&self, payload: &Payload) -> HealthReport;

    /// Request specs for a search. Flat providers return one; scraped
    /// providers may return several pages.
    fn build_search_requests(&self, input: &SearchInput) -> Vec<RequestSpec>;

    /// Follow-up requests extracted from a search payload (detail pages for
    /// scraped providers). The default is a flat provider with none.
    fn extract_detail_requests(&self, _payload: &Payload) -> Vec<RequestSpec> {
        Vec::new()
    }

    /// Convert a payload (search response, or one detail page for two-phase
    /// providers) into normalized results. Single-item parse failures are
    /// logged and dropped; the batch continues.
    fn parse_search_results(&self, payload: &Payload) -> Vec<SearchResult>;
}

/// Host suffixes claimed by each direct adapter, consulted when the config
/// does not pin a `provider_key`.
const DIRECT_ADAPTERS: &[(&str, &[&str])] = &[
    ("myanonamouse", &["myanonamouse.net"]),
    (
        "audiobookbay",
        &[
            "audiobookbay.lu",
            "audiobookbay.se",
            "audiobookbay.li",
            "audiobookbay.tw",
            "audiobookbay.is",
        ],
    ),
];

fn build_direct_adapter(key: &str, config: &IndexerConfig) -> Option<Arc<dyn ProviderAdapter>> {
    match key {
        "myanonamouse" => Some(Arc::new(MyAnonamouseAdapter::new(config))),
        "audiobookbay" => Some(Arc::new(AudiobookBayAdapter::new(config))),
        "generic" => Some(Arc::new(GenericJsonAdapter::new(config))),
        _ => None,
    }
}

fn host_of(base_url: &str) -> String {
    Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_lowercase()))
        .unwrap_or_else(|| base_url.to_lowercase())
}

/// Resolve the adapter for a configuration. Torznab configs always get the
/// Torznab adapter; direct configs resolve `provider_key` first, then the
/// host-suffix table, then fall back to the generic JSON adapter.
pub fn resolve_adapter(config: &IndexerConfig) -> Arc<dyn ProviderAdapter> {
    if config.kind.is_torznab() {
        return Arc::new(TorznabAdapter::new(config));
    }

    if let Some(key) = config.provider_key.as_deref() {
        if let Some(adapter) = build_direct_adapter(&key.to_lowercase(), config) {
            return adapter;
        }
        tracing::warn!(
            indexer = %config.key,
            provider_key = %key,
            "Unknown provider_key, falling back to domain matching"
        );
    }

    let host = host_of(config.effective_base_url());
    for (key, domains) in DIRECT_ADAPTERS {
        if domains.iter().any(|domain| host.ends_with(domain)) {
            if let Some(adapter) = build_direct_adapter(key, config) {
                return adapter;
            }
        }
    }

    Arc::new(GenericJsonAdapter::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexerKind as Kind;

    fn direct_config(base_url: &str, provider_key: Option<&str>) -> IndexerConfig {
        let mut config: IndexerConfig = toml::from_str(&format!(
            r#"
            name = "Test"
            enabled = true
            type = "direct"
            base_url = "{base_url}"
            session_id = "sid"
            "#
        ))
        .unwrap();
        config.key = "test".to_string();
        config.provider_key = provider_key.map(String::from);
        config
    }

    #[test]
    fn test_resolve_torznab_for_jackett() {
        let mut config = direct_config("http://localhost:9117", None);
        config.kind = Kind::Jackett;
        assert_eq!(resolve_adapter(&config).key(), "torznab");
    }

    #[test]
    fn test_resolve_by_provider_key() {
        let config = direct_config("https://example.org", Some("myanonamouse"));
        assert_eq!(resolve_adapter(&config).key(), "myanonamouse");
    }

    #[test]
    fn test_resolve_by_domain() {
        let config = direct_config("https://www.myanonamouse.net", None);
        assert_eq!(resolve_adapter(&config).key(), "myanonamouse");

        let config = direct_config("https://audiobookbay.lu", None);
        assert_eq!(resolve_adapter(&config).key(), "audiobookbay");
    }

    #[test]
    fn test_resolve_fallback_generic() {
        let config = direct_config("https://tracker.unknown.example", None);
        assert_eq!(resolve_adapter(&config).key(), "generic");
    }

    #[test]
    fn test_unknown_provider_key_falls_back_to_domain() {
        let config = direct_config("https://audiobookbay.is", Some("nonsense"));
        assert_eq!(resolve_adapter(&config).key(), "audiobookbay");
    }
}
