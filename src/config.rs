use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Top-level configuration: one `[indexers.<key>]` table per indexer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub indexers: BTreeMap<String, IndexerConfig>,
}

/// How an indexer speaks to its upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexerKind {
    /// Jackett Torznab endpoint
    #[default]
    Jackett,
    /// Prowlarr exposes the same Torznab API
    Prowlarr,
    /// Direct provider API or site scrape
    Direct,
}

impl IndexerKind {
    /// True for anything speaking the Torznab wire protocol
    pub fn is_torznab(&self) -> bool {
        matches!(self, Self::Jackett | Self::Prowlarr)
    }
}

impl std::fmt::Display for IndexerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jackett => write!(f, "jackett"),
            Self::Prowlarr => write!(f, "prowlarr"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Per-indexer rate limit settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub max_concurrent: usize,
}

/// Configuration for one indexer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Table key; filled in after parsing
    #[serde(skip)]
    pub key: String,

    pub name: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default, rename = "type")]
    pub kind: IndexerKind,

    #[serde(default)]
    pub base_url: String,

    /// Full Jackett feed URL; takes precedence over base_url for torznab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Pins a specific direct-provider adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_key: Option<String>,

    /// Lower number = searched earlier; ties broken by key
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Category ids forwarded to the provider (Torznab or tracker-native)
    #[serde(default)]
    pub categories: Vec<String>,

    /// Language codes, direct providers only
    #[serde(default)]
    pub languages: Vec<String>,

    /// Provider-side search type (MyAnonamouse: all/active/fl/vip/...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,

    #[serde(default = "default_true", rename = "verify_ssl")]
    pub verify_tls: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout", rename = "timeout")]
    pub timeout_secs: u64,

    #[serde(
        default = "default_rps",
        rename = "rate_limit_requests_per_second"
    )]
    pub rate_limit_requests_per_second: u32,

    #[serde(
        default = "default_max_concurrent",
        rename = "rate_limit_max_concurrent"
    )]
    pub rate_limit_max_concurrent: usize,
}

fn default_priority() -> i32 {
    999
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_rps() -> u32 {
    2
}

fn default_max_concurrent() -> usize {
    2
}

impl IndexerConfig {
    /// The URL requests are composed against. Torznab entries may supply the
    /// full Jackett feed URL instead of a bare base.
    pub fn effective_base_url(&self) -> &str {
        match &self.feed_url {
            Some(feed) if !feed.is_empty() => feed,
            _ => &self.base_url,
        }
    }

    /// Jackett indexer id embedded in a feed URL ("/indexers/<id>/"), used
    /// for diagnostics only.
    pub fn torznab_indexer_id(&self) -> String {
        self.feed_url
            .as_deref()
            .and_then(|feed| feed.split("/indexers/").nth(1))
            .and_then(|rest| rest.split('/').next())
            .unwrap_or("all")
            .to_string()
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second: self.rate_limit_requests_per_second.max(1),
            max_concurrent: self.rate_limit_max_concurrent.max(1),
        }
    }

    /// Reject configurations that cannot possibly work before an indexer is
    /// built from them.
    pub fn validate(&self) -> crate::Result<()> {
        if self.effective_base_url().trim().is_empty() {
            return Err(crate::Error::Config(format!(
                "indexer '{}' has no base_url",
                self.key
            )));
        }
        if self.kind == IndexerKind::Direct
            && self.session_id.as_deref().unwrap_or("").trim().is_empty()
        {
            return Err(crate::Error::Config(format!(
                "direct indexer '{}' requires a session_id",
                self.key
            )));
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path()?)
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let mut config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        // Table keys double as the indexer keys
        for (key, indexer) in config.indexers.iter_mut() {
            indexer.key = key.clone();
            if indexer.name.is_empty() {
                indexer.name = key.clone();
            }
        }

        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "listenarr", "listenarr")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Enabled indexers ordered by (priority asc, key asc)
    pub fn enabled_indexers(&self) -> Vec<IndexerConfig> {
        let mut configs: Vec<IndexerConfig> = self
            .indexers
            .values()
            .filter(|cfg| cfg.enabled)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.key.cmp(&b.key)));
        configs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Config {
        let mut config: Config = toml::from_str(content).unwrap();
        for (key, indexer) in config.indexers.iter_mut() {
            indexer.key = key.clone();
        }
        config
    }

    #[test]
    fn test_parse_indexer_tables() {
        let config = parse(
            r#"
            [indexers.jackett_main]
            name = "Jackett"
            enabled = true
            type = "jackett"
            base_url = "http://localhost:9117"
            api_key = "secret"
            priority = 1
            categories = ["3030"]

            [indexers.mam]
            name = "MyAnonamouse"
            enabled = false
            type = "direct"
            base_url = "https://www.myanonamouse.net"
            session_id = "sid"
            "#,
        );

        assert_eq!(config.indexers.len(), 2);
        let jackett = &config.indexers["jackett_main"];
        assert!(jackett.kind.is_torznab());
        assert_eq!(jackett.priority, 1);
        assert_eq!(jackett.categories, vec!["3030"]);
        assert!(jackett.verify_tls);
        assert_eq!(jackett.timeout_secs, 30);

        let mam = &config.indexers["mam"];
        assert_eq!(mam.kind, IndexerKind::Direct);
        assert!(!mam.enabled);
    }

    #[test]
    fn test_enabled_indexers_priority_order() {
        let config = parse(
            r#"
            [indexers.b_second]
            name = "B"
            enabled = true
            base_url = "http://b"
            priority = 2

            [indexers.a_tied]
            name = "A"
            enabled = true
            base_url = "http://a"
            priority = 1

            [indexers.z_tied]
            name = "Z"
            enabled = true
            base_url = "http://z"
            priority = 1

            [indexers.off]
            name = "Off"
            enabled = false
            base_url = "http://off"
            priority = 0
            "#,
        );

        let order: Vec<String> = config
            .enabled_indexers()
            .into_iter()
            .map(|cfg| cfg.key)
            .collect();
        assert_eq!(order, vec!["a_tied", "z_tied", "b_second"]);
    }

    #[test]
    fn test_feed_url_indexer_id() {
        let config = parse(
            r#"
            [indexers.j]
            name = "J"
            enabled = true
            feed_url = "http://localhost:9117/api/v2.0/indexers/myano/results/torznab"
            "#,
        );
        let cfg = &config.indexers["j"];
        assert_eq!(cfg.torznab_indexer_id(), "myano");
        assert_eq!(
            cfg.effective_base_url(),
            "http://localhost:9117/api/v2.0/indexers/myano/results/torznab"
        );
    }

    #[test]
    fn test_validate_direct_requires_session() {
        let config = parse(
            r#"
            [indexers.d]
            name = "D"
            enabled = true
            type = "direct"
            base_url = "https://tracker.example"
            "#,
        );
        assert!(config.indexers["d"].validate().is_err());
    }
}
