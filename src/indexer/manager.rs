//! Indexer manager
//!
//! Owns the set of configured indexers, ordered by priority, and fans
//! searches out across them. Worker failures and wall-clock timeouts are
//! contained per indexer so a slow or broken provider never sinks a search.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::Duration;

use crate::config::IndexerConfig;
use crate::error::Result;
use crate::models::SearchResult;
use crate::providers::resolve_adapter;

use super::indexer::{ConnectionTest, Indexer, IndexerStatus};
use super::transport::{HttpTransport, Transport};

/// Upper bound on concurrently searching indexers
const MAX_PARALLEL_SEARCHES: usize = 5;

/// Wall-clock budget per indexer worker, on top of the HTTP timeout
const WORKER_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds a transport for an indexer config; injectable so tests can count
/// and script HTTP traffic.
pub type TransportFactory =
    dyn Fn(&IndexerConfig) -> Result<Arc<dyn Transport>> + Send + Sync;

/// Aggregate status over all managed indexers
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub total: usize,
    pub available: usize,
    pub indexers: Vec<IndexerStatus>,
}

pub struct IndexerManager {
    indexers: RwLock<Arc<Vec<Arc<Indexer>>>>,
    transport_factory: Box<TransportFactory>,
}

impl IndexerManager {
    /// Build a manager over the given configs with the default HTTP transport
    pub fn new(configs: Vec<IndexerConfig>) -> Self {
        Self::with_transport_factory(
            configs,
            Box::new(|config| {
                Ok(Arc::new(HttpTransport::new(
                    config.timeout_secs,
                    config.verify_tls,
                )?) as Arc<dyn Transport>)
            }),
        )
    }

    pub fn with_transport_factory(
        configs: Vec<IndexerConfig>,
        transport_factory: Box<TransportFactory>,
    ) -> Self {
        let built = Self::build_indexers(&transport_factory, configs);
        Self {
            indexers: RwLock::new(Arc::new(built)),
            transport_factory,
        }
    }

    fn build_indexers(
        transport_factory: &TransportFactory,
        configs: Vec<IndexerConfig>,
    ) -> Vec<Arc<Indexer>> {
        let mut enabled: Vec<IndexerConfig> =
            configs.into_iter().filter(|config| config.enabled).collect();
        enabled.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.key.cmp(&b.key)));

        let mut indexers = Vec::with_capacity(enabled.len());
        for config in enabled {
            if let Err(err) = config.validate() {
                tracing::error!(indexer = %config.key, error = %err, "Skipping invalid indexer config");
                continue;
            }
            let transport = match transport_factory(&config) {
                Ok(transport) => transport,
                Err(err) => {
                    tracing::error!(indexer = %config.key, error = %err, "Failed to build transport");
                    continue;
                }
            };
            let adapter = resolve_adapter(&config);
            tracing::info!(
                indexer = %config.key,
                priority = config.priority,
                kind = %config.kind,
                "Loaded indexer"
            );
            indexers.push(Arc::new(Indexer::new(config, adapter, transport)));
        }
        indexers
    }

    async fn snapshot(&self) -> Arc<Vec<Arc<Indexer>>> {
        self.indexers.read().await.clone()
    }

    pub async fn indexer_count(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Indexer>> {
        self.snapshot()
            .await
            .iter()
            .find(|indexer| indexer.key() == key)
            .cloned()
    }

    /// Search all managed indexers. Unavailable indexers answer with empty
    /// lists without any I/O; a worker that errors or overruns its wall clock
    /// contributes nothing and is recorded against that indexer.
    pub async fn search(
        &self,
        query: &str,
        author: Option<&str>,
        title: Option<&str>,
        limit_per_indexer: u32,
        parallel: bool,
    ) -> Vec<SearchResult> {
        let indexers = self.snapshot().await;
        if indexers.is_empty() {
            tracing::warn!("No indexers available for search");
            return Vec::new();
        }

        tracing::info!(
            indexers = indexers.len(),
            %query,
            author = author.unwrap_or(""),
            title = title.unwrap_or(""),
            "Fanning out search"
        );

        let all_results = if parallel && indexers.len() > 1 {
            self.search_parallel(&indexers, query, author, title, limit_per_indexer)
                .await
        } else {
            let mut all_results = Vec::new();
            for indexer in indexers.iter() {
                let results = indexer
                    .search(query, author, title, limit_per_indexer, 0)
                    .await;
                tracing::debug!(
                    indexer = indexer.key(),
                    count = results.len(),
                    "Sequential search finished"
                );
                all_results.extend(results);
            }
            all_results
        };

        tracing::info!(count = all_results.len(), "Total results from all indexers");
        all_results
    }

    async fn search_parallel(
        &self,
        indexers: &[Arc<Indexer>],
        query: &str,
        author: Option<&str>,
        title: Option<&str>,
        limit: u32,
    ) -> Vec<SearchResult> {
        let workers = Arc::new(Semaphore::new(indexers.len().min(MAX_PARALLEL_SEARCHES)));

        let futures = indexers.iter().map(|indexer| {
            let indexer = indexer.clone();
            let workers = workers.clone();
            let query = query.to_string();
            let author = author.map(String::from);
            let title = title.map(String::from);

            async move {
                let _permit = workers.acquire().await.expect("worker semaphore never closed");
                match tokio::time::timeout(
                    WORKER_TIMEOUT,
                    indexer.search(&query, author.as_deref(), title.as_deref(), limit, 0),
                )
                .await
                {
                    Ok(results) => {
                        tracing::debug!(
                            indexer = indexer.key(),
                            count = results.len(),
                            "Parallel search finished"
                        );
                        results
                    }
                    Err(_) => {
                        indexer
                            .record_failure(&format!(
                                "worker timeout after {}s",
                                WORKER_TIMEOUT.as_secs()
                            ))
                            .await;
                        Vec::new()
                    }
                }
            }
        });

        join_all(futures).await.into_iter().flatten().collect()
    }

    /// Test every indexer's connection, serially, keyed by indexer key
    pub async fn test_all(&self) -> BTreeMap<String, ConnectionTest> {
        let indexers = self.snapshot().await;
        let mut results = BTreeMap::new();
        for indexer in indexers.iter() {
            tracing::debug!(indexer = indexer.key(), name = indexer.name(), "Testing connection");
            let test = indexer.test_connection().await;
            if test.success {
                tracing::info!(indexer = indexer.key(), "Connection test passed");
            } else {
                tracing::error!(
                    indexer = indexer.key(),
                    error = test.error.as_deref().unwrap_or("unknown"),
                    "Connection test failed"
                );
            }
            results.insert(indexer.key().to_string(), test);
        }
        results
    }

    /// Rebuild the indexer set from fresh configs. Health state does not
    /// survive a reload; in-flight searches keep the old set.
    pub async fn reload(&self, configs: Vec<IndexerConfig>) {
        let built = Self::build_indexers(&self.transport_factory, configs);
        let count = built.len();
        *self.indexers.write().await = Arc::new(built);
        tracing::info!(indexers = count, "Reloaded indexers");
    }

    pub async fn status(&self) -> ManagerStatus {
        let indexers = self.snapshot().await;
        let mut statuses = Vec::with_capacity(indexers.len());
        for indexer in indexers.iter() {
            statuses.push(indexer.status().await);
        }
        let available = statuses.iter().filter(|status| status.health.available).count();
        ManagerStatus {
            total: statuses.len(),
            available,
            indexers: statuses,
        }
    }
}

impl std::fmt::Debug for IndexerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerManager").finish_non_exhaustive()
    }
}
