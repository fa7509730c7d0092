//! Search query models

use serde::{Deserialize, Serialize};

/// Whether results are presented for user selection or auto-picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Ranked list, capped, for user selection
    #[default]
    Manual,
    /// Single best pick for unattended grabbing
    Automatic,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Automatic => write!(f, "automatic"),
        }
    }
}

/// User-facing search request. Either field may be empty, not both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub mode: SearchMode,
}

impl SearchQuery {
    pub fn new(title: impl Into<String>, author: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            mode,
        }
    }

    /// True when there is nothing to search for
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.author.trim().is_empty()
    }
}

/// Query derived once per request: cleaned terms plus the title variants that
/// are actually sent to providers.
#[derive(Debug, Clone, Default)]
pub struct NormalizedQuery {
    pub canonical_title: String,
    pub canonical_author: String,
    /// Deduped, order-preserving; the canonical title is always first
    pub variant_titles: Vec<String>,
}
