//! Indexer: one configured provider endpoint
//!
//! Wraps a pure adapter with everything stateful: URL composition, auth
//! injection, the HTTP transport, health counters, and rate limiting.
//! Transport errors never escape `search()`; they are recorded against the
//! indexer and surface as an empty result list.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{IndexerConfig, IndexerKind};
use crate::error::{Error, Result};
use crate::models::SearchResult;
use crate::providers::{Capabilities, Payload, ProviderAdapter, RequestSpec, SearchInput};

use super::health::{HealthSnapshot, HealthState};
use super::rate_limit::IndexerLimiter;
use super::transport::{PreparedRequest, Transport};

/// Result of a connection test
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status line for one indexer, as reported by the manager
#[derive(Debug, Clone, Serialize)]
pub struct IndexerStatus {
    pub key: String,
    pub name: String,
    pub kind: String,
    pub base_url: String,
    pub priority: i32,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

pub struct Indexer {
    config: IndexerConfig,
    adapter: Arc<dyn ProviderAdapter>,
    transport: Arc<dyn Transport>,
    health: Mutex<HealthState>,
    limiter: IndexerLimiter,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        adapter: Arc<dyn ProviderAdapter>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let limiter = IndexerLimiter::new(config.rate_limit());
        tracing::debug!(
            indexer = %config.key,
            adapter = adapter.key(),
            base_url = %config.effective_base_url(),
            "Initialized indexer"
        );
        Self {
            config,
            adapter,
            transport,
            health: Mutex::new(HealthState::default()),
            limiter,
        }
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub async fn is_available(&self) -> bool {
        self.health.lock().await.is_available()
    }

    pub async fn status(&self) -> IndexerStatus {
        let health = self.health.lock().await;
        IndexerStatus {
            key: self.config.key.clone(),
            name: self.config.name.clone(),
            kind: self.config.kind.to_string(),
            base_url: self.config.effective_base_url().to_string(),
            priority: self.config.priority,
            health: HealthSnapshot::from(&*health),
        }
    }

    /// Run a connection test and report whether the indexer came up
    pub async fn connect(&self) -> bool {
        self.test_connection().await.success
    }

    /// Execute the adapter's health request (if any), caching capabilities on
    /// success. This is the only path that closes an open circuit.
    pub async fn test_connection(&self) -> ConnectionTest {
        let Some(spec) = self.adapter.build_health_request() else {
            let mut health = self.health.lock().await;
            health.mark_success();
            return ConnectionTest {
                success: true,
                capabilities: health.capabilities.clone(),
                version: None,
                error: None,
            };
        };

        match self.execute(&spec).await {
            Ok(payload) => {
                let report = self.adapter.parse_health_response(&payload);
                let mut health = self.health.lock().await;
                health.capabilities = Some(report.capabilities.clone());
                health.mark_success();
                ConnectionTest {
                    success: true,
                    capabilities: Some(report.capabilities),
                    version: Some(report.version),
                    error: None,
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.record_failure(&message).await;
                ConnectionTest {
                    success: false,
                    capabilities: None,
                    version: None,
                    error: Some(message),
                }
            }
        }
    }

    /// Search this indexer. Returns an empty list without I/O when the
    /// circuit is open; never errors toward the caller.
    pub async fn search(
        &self,
        query: &str,
        author: Option<&str>,
        title: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Vec<SearchResult> {
        let supports_book_search = {
            let health = self.health.lock().await;
            if !health.is_available() {
                tracing::warn!(indexer = %self.config.key, "Indexer unavailable, skipping search");
                return Vec::new();
            }
            health
                .capabilities
                .as_ref()
                .map(|caps| caps.book_search_available)
                .unwrap_or(false)
        };

        let input = SearchInput {
            query: query.to_string(),
            author: author.unwrap_or("").to_string(),
            title: title.unwrap_or("").to_string(),
            limit,
            offset,
            supports_book_search,
        };

        let specs = self.adapter.build_search_requests(&input);
        if specs.is_empty() {
            return Vec::new();
        }

        // The first request is authoritative; extra pages are best-effort.
        let mut payloads = Vec::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            match self.execute(spec).await {
                Ok(payload) => payloads.push(payload),
                Err(err) if idx == 0 => {
                    self.record_failure(&err.to_string()).await;
                    return Vec::new();
                }
                Err(err) => {
                    tracing::debug!(
                        indexer = %self.config.key,
                        page = idx + 1,
                        error = %err,
                        "Extra search page failed"
                    );
                }
            }
        }

        let mut detail_specs: Vec<RequestSpec> = Vec::new();
        let mut seen_paths = std::collections::HashSet::new();
        for payload in &payloads {
            for spec in self.adapter.extract_detail_requests(payload) {
                if seen_paths.insert(spec.path.clone()) {
                    detail_specs.push(spec);
                }
            }
        }

        let mut results = Vec::new();
        if detail_specs.is_empty() {
            for payload in &payloads {
                results.extend(self.adapter.parse_search_results(payload));
            }
        } else {
            for spec in &detail_specs {
                match self.execute(spec).await {
                    Ok(payload) => results.extend(self.adapter.parse_search_results(&payload)),
                    Err(err) => {
                        tracing::debug!(
                            indexer = %self.config.key,
                            path = %spec.path,
                            error = %err,
                            "Detail fetch failed"
                        );
                    }
                }
            }
        }

        for result in &mut results {
            result.indexer_name = self.config.name.clone();
        }

        self.health.lock().await.mark_success();
        tracing::debug!(
            indexer = %self.config.key,
            count = results.len(),
            "Search returned results"
        );
        results
    }

    /// Record a failure observed outside `search()` (manager wall-clock
    /// timeouts land here).
    pub async fn record_failure(&self, error: &str) {
        let circuit_opened = self.health.lock().await.mark_failure(error);
        tracing::error!(indexer = %self.config.key, error = %error, "Indexer request failed");
        if circuit_opened {
            tracing::warn!(
                indexer = %self.config.key,
                "Indexer marked unavailable after repeated failures"
            );
        }
    }

    /// Compose, authorize, rate limit, and execute one request spec
    async fn execute(&self, spec: &RequestSpec) -> Result<Payload> {
        let prepared = self.prepare(spec)?;
        let _permit = self.limiter.acquire().await;
        self.transport.execute(&prepared).await
    }

    fn prepare(&self, spec: &RequestSpec) -> Result<PreparedRequest> {
        let base = self.config.effective_base_url().trim_end_matches('/');
        let url = if spec.path.starts_with("http://") || spec.path.starts_with("https://") {
            spec.path.clone()
        } else if spec.path.is_empty() {
            base.to_string()
        } else {
            let mut url = base.to_string();
            if !spec.path.starts_with('/') {
                url.push('/');
            }
            url.push_str(&spec.path);
            url
        };

        let mut params = spec.params.clone();
        let mut headers = spec.headers.clone();

        match self.config.kind {
            IndexerKind::Jackett | IndexerKind::Prowlarr => {
                if let Some(api_key) = self.config.api_key.as_deref() {
                    params.push(("apikey".to_string(), api_key.to_string()));
                }
            }
            IndexerKind::Direct => {
                let session_id = self
                    .config
                    .session_id
                    .as_deref()
                    .ok_or_else(|| {
                        Error::Config(format!(
                            "direct indexer '{}' has no session_id",
                            self.config.key
                        ))
                    })?;
                headers.push(("Authorization".to_string(), format!("Bearer {session_id}")));
                headers.push(("X-Session-ID".to_string(), session_id.to_string()));
                headers.push((
                    "Cookie".to_string(),
                    format!(
                        "mam_id={session_id}; session={session_id}; session_id={session_id}"
                    ),
                ));
            }
        }

        Ok(PreparedRequest {
            method: spec.method,
            url,
            params,
            form: spec.form.clone(),
            headers,
            expects_json: spec.expects_json,
            allow_missing: spec.allow_missing,
        })
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("key", &self.config.key)
            .field("kind", &self.config.kind)
            .field("adapter", &self.adapter.key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::testing::{torznab_config, torznab_item_feed, StubTransport};

    fn indexer_with(transport: Arc<StubTransport>) -> Indexer {
        let config = torznab_config("jackett_a", "Jackett A", 1);
        let adapter = crate::providers::resolve_adapter(&config);
        Indexer::new(config, adapter, transport)
    }

    #[tokio::test]
    async fn test_search_returns_parsed_results() {
        let transport = Arc::new(StubTransport::new());
        transport.push_text(torznab_item_feed(&[(
            "Mark of the Fool 8 [M4B 128]",
            "https://tracker.example/x/file.torrent",
            "J.M. Clarke",
        )]));

        let indexer = indexer_with(transport.clone());
        let results = indexer.search("Mark of the Fool 8", None, None, 100, 0).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].indexer_name, "Jackett A");
        assert_eq!(transport.calls(), 1);
        assert!(indexer.is_available().await);
    }

    #[tokio::test]
    async fn test_search_failure_marks_indexer() {
        let transport = Arc::new(StubTransport::new());
        transport.push_error(Error::Timeout(30));

        let indexer = indexer_with(transport);
        let results = indexer.search("anything", None, None, 100, 0).await;

        assert!(results.is_empty());
        let status = indexer.status().await;
        assert_eq!(status.health.consecutive_failures, 1);
        assert!(status.health.last_error.is_some());
    }

    #[tokio::test]
    async fn test_circuit_opens_and_skips_io() {
        let transport = Arc::new(StubTransport::new());
        for _ in 0..3 {
            transport.push_error(Error::Network("connection refused".into()));
        }

        let indexer = indexer_with(transport.clone());
        for _ in 0..3 {
            indexer.search("q", None, None, 100, 0).await;
        }
        assert!(!indexer.is_available().await);
        assert_eq!(transport.calls(), 3);

        // fourth search performs no HTTP at all
        let results = indexer.search("q", None, None, 100, 0).await;
        assert!(results.is_empty());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_connect_reports_health_outcome() {
        let transport = Arc::new(StubTransport::new());
        transport.push_text("<caps></caps>".to_string());
        let indexer = indexer_with(transport.clone());
        assert!(indexer.connect().await);

        transport.push_error(Error::Network("down".into()));
        assert!(!indexer.connect().await);
    }

    #[tokio::test]
    async fn test_recovery_via_test_connection() {
        let transport = Arc::new(StubTransport::new());
        for _ in 0..3 {
            transport.push_error(Error::Network("down".into()));
        }

        let indexer = indexer_with(transport.clone());
        for _ in 0..3 {
            indexer.search("q", None, None, 100, 0).await;
        }
        assert!(!indexer.is_available().await);

        transport.push_text(
            r#"<caps><searching><search available="yes" supportedParams="q"/><book-search available="yes" supportedParams="q"/></searching></caps>"#
                .to_string(),
        );
        let test = indexer.test_connection().await;
        assert!(test.success);
        assert!(test.capabilities.unwrap().book_search_available);
        assert!(indexer.is_available().await);
    }

    #[tokio::test]
    async fn test_failed_health_check_counts_failure() {
        let transport = Arc::new(StubTransport::new());
        transport.push_error(Error::AuthRejected("HTTP 403".into()));

        let indexer = indexer_with(transport);
        let test = indexer.test_connection().await;
        assert!(!test.success);
        assert!(test.error.unwrap().contains("403"));
        assert_eq!(indexer.status().await.health.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_direct_auth_injection() {
        let mut config: IndexerConfig = toml::from_str(
            r#"
            name = "MyAnonamouse"
            enabled = true
            type = "direct"
            base_url = "https://www.myanonamouse.net"
            session_id = "sid-123"
            "#,
        )
        .unwrap();
        config.key = "mam".to_string();
        let adapter = crate::providers::resolve_adapter(&config);

        let transport = Arc::new(StubTransport::new());
        transport.push_json(serde_json::json!({"data": []}));
        let indexer = Indexer::new(config, adapter, transport.clone());

        let results = indexer.search("test", None, None, 50, 0).await;
        assert!(results.is_empty());

        let request = transport.last_request().unwrap();
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer sid-123".to_string())));
        assert!(request
            .headers
            .contains(&("X-Session-ID".to_string(), "sid-123".to_string())));
        assert!(request.headers.iter().any(|(key, value)| {
            key == "Cookie" && value.contains("mam_id=sid-123") && value.contains("session=sid-123")
        }));
        assert!(request.url.starts_with("https://www.myanonamouse.net/tor/js/"));
    }

    #[tokio::test]
    async fn test_torznab_apikey_injection() {
        let transport = Arc::new(StubTransport::new());
        transport.push_text(torznab_item_feed(&[]));
        let indexer = indexer_with(transport.clone());

        indexer.search("q", None, None, 100, 0).await;
        let request = transport.last_request().unwrap();
        assert!(request
            .params
            .contains(&("apikey".to_string(), "test-key".to_string())));
    }
}
