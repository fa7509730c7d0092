//! Error types for Listenarr

use thiserror::Error;

/// Main error type for Listenarr
#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Indexer not found: {0}")]
    IndexerNotFound(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authorization rejected: {0}")]
    AuthRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Indexer unavailable (circuit open): {0}")]
    Unavailable(String),

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map a transport-level reqwest failure into the provider-agnostic taxonomy.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Error::Timeout(timeout_secs)
        } else {
            Error::Network(err.to_string())
        }
    }

    /// Map an HTTP status into the provider-agnostic taxonomy.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Error::AuthRejected(format!("HTTP {status}")),
            404 => Error::NotFound(body),
            _ => Error::Http { status, body },
        }
    }
}

/// Result type alias for Listenarr operations
pub type Result<T> = std::result::Result<T, Error>;
