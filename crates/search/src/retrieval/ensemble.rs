//! Ensemble retrieval over every category index
//!
//! All lookups start together and each one gets its own deadline. A
//! failed or late index is left out of the merge; only a round in which
//! every index failed is an error.

use super::{merge, IndexQuery, SearchIndex};
use futures::future::join_all;
use graphqa_common::config::RetrievalConfig;
use graphqa_common::errors::{AppError, ErrorCode, Result};
use graphqa_common::metrics::record_retrieval;
use graphqa_common::models::{Candidate, EntityId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Merged candidates plus the indexes that did not answer
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    pub candidates: Vec<Candidate>,
    pub failed_indexes: Vec<String>,
}

impl RetrievalOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed_indexes.is_empty()
    }
}

pub struct EnsembleRetriever {
    indexes: Vec<Arc<dyn SearchIndex>>,
    index_timeout: Duration,
    retry_backoff: Duration,
    min_score: f32,
}

impl EnsembleRetriever {
    pub fn new(indexes: Vec<Arc<dyn SearchIndex>>, config: &RetrievalConfig) -> Self {
        Self {
            indexes,
            index_timeout: config.index_timeout(),
            retry_backoff: config.retry_backoff(),
            min_score: config.min_score,
        }
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// Query every index concurrently and merge the top `k`
    pub async fn retrieve(&self, query: &IndexQuery, k: usize) -> Result<RetrievalOutcome> {
        let start = Instant::now();

        let lookups = self.indexes.iter().map(|index| async move {
            let lookup = self.search_with_retry(index.as_ref(), query, k);
            (index, tokio::time::timeout(self.index_timeout, lookup).await)
        });

        let mut per_index = Vec::with_capacity(self.indexes.len());
        let mut failed_indexes = Vec::new();

        for (index, outcome) in join_all(lookups).await {
            match outcome {
                Ok(Ok(hits)) => per_index.push(
                    hits.into_iter()
                        .filter(|(_, score)| *score >= self.min_score)
                        .map(|(id, score)| Candidate::new(id, score, index.kind(), index.name()))
                        .collect::<Vec<_>>(),
                ),
                Ok(Err(e)) => {
                    tracing::warn!(index = index.name(), error = %e, "Index lookup failed");
                    failed_indexes.push(index.name().to_string());
                }
                Err(_) => {
                    tracing::warn!(
                        index = index.name(),
                        timeout_ms = self.index_timeout.as_millis() as u64,
                        "Index lookup timed out"
                    );
                    failed_indexes.push(index.name().to_string());
                }
            }
        }

        if !self.indexes.is_empty() && failed_indexes.len() == self.indexes.len() {
            record_retrieval(start.elapsed().as_secs_f64(), 0, &failed_indexes);
            return Err(AppError::RetrievalUnavailable { failed_indexes });
        }

        if !failed_indexes.is_empty() {
            tracing::warn!(
                code = ?ErrorCode::PartialRetrieval,
                failed = ?failed_indexes,
                answered = per_index.len(),
                "Continuing with reduced candidates"
            );
        }

        let candidates = merge(per_index, k);
        record_retrieval(start.elapsed().as_secs_f64(), candidates.len(), &failed_indexes);

        tracing::debug!(
            candidates = candidates.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Ensemble retrieval complete"
        );

        Ok(RetrievalOutcome {
            candidates,
            failed_indexes,
        })
    }

    async fn search_with_retry(
        &self,
        index: &dyn SearchIndex,
        query: &IndexQuery,
        k: usize,
    ) -> Result<Vec<(EntityId, f32)>> {
        match index.search(query, k).await {
            Err(e) if e.is_transient() => {
                tracing::debug!(index = index.name(), error = %e, "Retrying index lookup");
                tokio::time::sleep(self.retry_backoff).await;
                index.search(query, k).await
            }
            other => other,
        }
    }
}
