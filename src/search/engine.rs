//! Search engine facade
//!
//! Orchestrates a request end to end: validate, derive variant queries, fan
//! each variant out through the indexer manager, dedupe across variants,
//! score against the original terms, and shape the output for manual or
//! automatic selection. Keeps a bounded in-memory ring of recent outcomes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::indexer::{IndexerManager, ManagerStatus};
use crate::models::{NormalizedQuery, SearchMode, SearchQuery};

use super::processor::{AutomaticSelection, DisplayResult, ResultProcessor};
use super::quality::QualityAssessor;

/// Outcomes kept in the in-memory history ring
const HISTORY_LIMIT: usize = 50;

/// Results per indexer per variant query
const LIMIT_PER_INDEXER: u32 = 50;

/// Canned queries for the self-test endpoint
const TEST_AUDIOBOOKS: &[(&str, &str)] = &[
    ("Anima", "Blake Crouch"),
    ("The Primal Hunter", "Zogarth"),
];

/// Results of a search, shaped per mode
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProcessedResults {
    Manual(Vec<DisplayResult>),
    Automatic(Vec<AutomaticSelection>),
}

impl ProcessedResults {
    pub fn len(&self) -> usize {
        match self {
            Self::Manual(results) => results.len(),
            Self::Automatic(results) => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one search request
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub success: bool,
    pub mode: SearchMode,
    pub query: SearchQuery,
    pub results: ProcessedResults,
    pub result_count: usize,
    pub search_time_s: f64,
    pub indexers_searched: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Self-test report for one canned query
#[derive(Debug, Clone, Serialize)]
pub struct QueryTest {
    pub title: String,
    pub author: String,
    pub search_successful: bool,
    pub result_count: usize,
    pub search_time_s: f64,
    pub indexers_searched: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionalityTest {
    pub success: bool,
    pub tests: Vec<QueryTest>,
    pub indexer_status: ManagerStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub service_name: &'static str,
    pub history_entries: usize,
    pub history_limit: usize,
    pub indexer_status: ManagerStatus,
}

/// The search federation facade. Construction is plain dependency
/// injection: hand it the manager it should fan out through.
pub struct SearchEngine {
    manager: Arc<IndexerManager>,
    assessor: QualityAssessor,
    processor: ResultProcessor,
    history: Mutex<VecDeque<SearchOutcome>>,
}

impl SearchEngine {
    pub fn new(manager: Arc<IndexerManager>) -> Self {
        Self {
            manager,
            assessor: QualityAssessor::new(),
            processor: ResultProcessor::new(),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
        }
    }

    pub fn manager(&self) -> &Arc<IndexerManager> {
        &self.manager
    }

    /// Search every available indexer for an audiobook
    pub async fn search_for_audiobook(
        &self,
        title: &str,
        author: &str,
        mode: SearchMode,
    ) -> SearchOutcome {
        let start = Instant::now();
        let query = SearchQuery::new(title, author, mode);

        if query.is_empty() {
            let outcome = SearchOutcome {
                success: false,
                mode,
                query,
                results: empty_results(mode),
                result_count: 0,
                search_time_s: 0.0,
                indexers_searched: 0,
                timestamp: Utc::now(),
                error: Some("at least one of title or author is required".to_string()),
            };
            self.remember(outcome.clone()).await;
            return outcome;
        }

        let normalized = NormalizedQuery::from_query(&query);
        tracing::info!(
            %title,
            %author,
            mode = %mode,
            variants = normalized.variant_titles.len(),
            "Starting audiobook search"
        );

        // Variants run serially; the fan-out happens inside each call.
        let mut raw_results = Vec::new();
        for (idx, variant) in normalized.variant_titles.iter().enumerate() {
            tracing::info!(
                variant = idx + 1,
                total = normalized.variant_titles.len(),
                query = %variant,
                "Running search variant"
            );

            let combined = format!("{} {}", variant, normalized.canonical_author)
                .trim()
                .to_string();
            let variant_results = self
                .manager
                .search(
                    &combined,
                    Some(normalized.canonical_author.as_str()),
                    Some(variant.as_str()),
                    LIMIT_PER_INDEXER,
                    true,
                )
                .await;

            for mut result in variant_results {
                result.search_query_used.get_or_insert_with(|| variant.clone());
                raw_results.push(result);
            }
        }

        let deduped = self.processor.deduplicate(raw_results);
        tracing::info!(count = deduped.len(), "Results after cross-variant dedup");

        // Score against the ORIGINAL terms, not the variants
        let scored = self
            .assessor
            .rank_results_by_quality(deduped, title, author);

        let results = match mode {
            SearchMode::Manual => ProcessedResults::Manual(self.processor.process_manual(&scored)),
            SearchMode::Automatic => ProcessedResults::Automatic(
                self.processor
                    .process_automatic(&scored, None)
                    .into_iter()
                    .collect(),
            ),
        };

        let outcome = SearchOutcome {
            success: true,
            mode,
            query,
            result_count: results.len(),
            results,
            search_time_s: (start.elapsed().as_secs_f64() * 100.0).round() / 100.0,
            indexers_searched: self.manager.indexer_count().await,
            timestamp: Utc::now(),
            error: None,
        };

        tracing::info!(
            count = outcome.result_count,
            elapsed_s = outcome.search_time_s,
            "Search complete"
        );
        self.remember(outcome.clone()).await;
        outcome
    }

    /// Run the canned test queries and report per-query counts
    pub async fn test_search_functionality(&self) -> FunctionalityTest {
        let mut tests = Vec::with_capacity(TEST_AUDIOBOOKS.len());
        for (title, author) in TEST_AUDIOBOOKS {
            let outcome = self
                .search_for_audiobook(title, author, SearchMode::Manual)
                .await;
            tests.push(QueryTest {
                title: title.to_string(),
                author: author.to_string(),
                search_successful: outcome.success,
                result_count: outcome.result_count,
                search_time_s: outcome.search_time_s,
                indexers_searched: outcome.indexers_searched,
            });
        }

        FunctionalityTest {
            success: tests.iter().all(|test| test.search_successful),
            tests,
            indexer_status: self.manager.status().await,
            timestamp: Utc::now(),
        }
    }

    /// Most recent outcomes first, up to `limit`
    #[allow(dead_code)]
    pub async fn search_history(&self, limit: usize) -> Vec<SearchOutcome> {
        let history = self.history.lock().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    pub async fn get_service_status(&self) -> ServiceStatus {
        ServiceStatus {
            service_name: "SearchEngine",
            history_entries: self.history.lock().await.len(),
            history_limit: HISTORY_LIMIT,
            indexer_status: self.manager.status().await,
        }
    }

    /// Drop accumulated history
    #[allow(dead_code)]
    pub async fn reset(&self) {
        self.history.lock().await.clear();
        tracing::info!("Search engine reset");
    }

    pub async fn shutdown(&self) {
        tracing::info!("Search engine shutdown complete");
    }

    async fn remember(&self, outcome: SearchOutcome) {
        let mut history = self.history.lock().await;
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(outcome);
    }
}

fn empty_results(mode: SearchMode) -> ProcessedResults {
    match mode {
        SearchMode::Manual => ProcessedResults::Manual(Vec::new()),
        SearchMode::Automatic => ProcessedResults::Automatic(Vec::new()),
    }
}
