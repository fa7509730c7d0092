//! Result processing: deduplication and output shaping
//!
//! Deduplication runs before scoring, because variant queries and
//! overlapping indexers routinely return the same release several times.
//! Manual mode yields a capped display list; automatic mode yields the
//! top-ranked result that passes the shape check.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::SearchResult;
use crate::utils::format_size;

use super::quality::{QualityScore, ScoredResult};

/// Manual results shown to the user are capped
const MAX_RESULTS_MANUAL: usize = 20;

/// One row of a manual search response
#[derive(Debug, Clone, Serialize)]
pub struct DisplayResult {
    /// 1-based position in the ranked list
    pub id: usize,
    pub title: String,
    pub author: String,
    pub indexer: String,
    /// Upper-cased container label for display
    pub format: String,
    pub bitrate: u32,
    /// Human-readable size
    pub size: String,
    pub size_bytes: u64,
    pub seeders: i64,
    pub peers: i64,
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    pub quality_assessment: QualityScore,
}

/// The automatic-mode pick
#[derive(Debug, Clone, Serialize)]
pub struct AutomaticSelection {
    pub book_id: Option<i64>,
    pub selected_result: SearchResult,
    pub selection_timestamp: DateTime<Utc>,
    /// 0-100, from the quality assessment
    pub confidence_score: f64,
    pub quality_assessment: QualityScore,
}

/// Per-format counts over a processed result set
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStats {
    pub total_results: usize,
    pub formats: std::collections::BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultProcessor;

impl ResultProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Drop duplicates, keeping the first occurrence. Two results are
    /// duplicates when they share a download URL, an info hash, or the same
    /// (indexer, title) pair.
    pub fn deduplicate(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();
        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

        let before = results.len();
        let mut unique = Vec::with_capacity(results.len());
        for result in results {
            let url = result.download_url.clone();
            let hash = result
                .info_hash
                .as_deref()
                .map(|hash| hash.to_lowercase())
                .filter(|hash| !hash.is_empty());
            let pair = (result.indexer_name.clone(), result.title.clone());

            let duplicate = (!url.is_empty() && seen_urls.contains(&url))
                || hash.as_ref().is_some_and(|hash| seen_hashes.contains(hash))
                || seen_pairs.contains(&pair);
            if duplicate {
                continue;
            }

            if !url.is_empty() {
                seen_urls.insert(url);
            }
            if let Some(hash) = hash {
                seen_hashes.insert(hash);
            }
            seen_pairs.insert(pair);
            unique.push(result);
        }

        if unique.len() < before {
            tracing::debug!(before, after = unique.len(), "Deduplicated results");
        }
        unique
    }

    /// Shape a ranked list for user selection: shape-checked, capped,
    /// formatted for display.
    pub fn process_manual(&self, scored: &[ScoredResult]) -> Vec<DisplayResult> {
        scored
            .iter()
            .filter(|scored| has_required_fields(&scored.result))
            .take(MAX_RESULTS_MANUAL)
            .enumerate()
            .map(|(idx, scored)| DisplayResult {
                id: idx + 1,
                title: scored.result.title.clone(),
                author: scored
                    .result
                    .author
                    .clone()
                    .unwrap_or_else(|| "Unknown Author".to_string()),
                indexer: scored.result.indexer_name.clone(),
                format: scored.result.format.to_string().to_uppercase(),
                bitrate: scored.result.bitrate_kbps,
                size: format_size(scored.result.size_bytes),
                size_bytes: scored.result.size_bytes,
                seeders: scored.result.seeders,
                peers: scored.result.peers,
                download_url: scored.result.download_url.clone(),
                info_hash: scored.result.info_hash.clone(),
                quality_assessment: scored.assessment.clone(),
            })
            .collect()
    }

    /// Pick the top-ranked result that passes the shape check
    pub fn process_automatic(
        &self,
        scored: &[ScoredResult],
        book_id: Option<i64>,
    ) -> Option<AutomaticSelection> {
        let best = scored
            .iter()
            .find(|scored| has_required_fields(&scored.result))?;

        Some(AutomaticSelection {
            book_id,
            selected_result: best.result.clone(),
            selection_timestamp: Utc::now(),
            confidence_score: best.assessment.confidence,
            quality_assessment: best.assessment.clone(),
        })
    }

    pub fn processing_stats(&self, results: &[DisplayResult]) -> ProcessingStats {
        let mut formats = std::collections::BTreeMap::new();
        for result in results {
            *formats.entry(result.format.to_lowercase()).or_insert(0) += 1;
        }
        ProcessingStats {
            total_results: results.len(),
            formats,
        }
    }
}

/// Minimum shape for a result to be actionable downstream
fn has_required_fields(result: &SearchResult) -> bool {
    !result.title.is_empty()
        && result.author.as_deref().is_some_and(|author| !author.is_empty())
        && !result.download_url.is_empty()
}
