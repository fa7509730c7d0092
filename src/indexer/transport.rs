//! HTTP transport seam
//!
//! Indexers execute adapter request specs through a `Transport`, which keeps
//! the HTTP client swappable for tests (scenario tests use counting stubs).

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Error, Result};
use crate::providers::{Method, Payload};

/// A fully composed request, ready for execution: URL resolved against the
/// indexer base, auth already injected.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub expects_json: bool,
    pub allow_missing: bool,
}

/// Executes prepared requests. Implementations own timeout and TLS policy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &PreparedRequest) -> Result<Payload>;
}

/// reqwest-backed transport, one per indexer so timeout and TLS verification
/// follow that indexer's configuration.
pub struct HttpTransport {
    client: Client,
    timeout_secs: u64,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64, verify_tls: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("Listenarr/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &PreparedRequest) -> Result<Payload> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if status.as_u16() == 404 && request.allow_missing {
            return Ok(Payload::Empty);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview = body.chars().take(160).collect::<String>();
            return Err(Error::from_status(status.as_u16(), preview));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        if body.is_empty() {
            return Ok(Payload::Empty);
        }

        if request.expects_json {
            let json = serde_json::from_str(&body)
                .map_err(|e| Error::Parse(format!("invalid JSON response: {e}")))?;
            Ok(Payload::Json(json))
        } else {
            Ok(Payload::Text(body))
        }
    }
}
