//! Retrieval pipeline.
//!
//! Over-fetches candidates from the store, has the relevance panel score
//! every one of them, then ranks, truncates, applies the token budget and
//! optionally drops near-duplicates. The ranking stage only starts once every
//! score is in.

use crate::models::{Memory, RetrieveRequest};
use crate::review::ConsensusReviewer;
use crate::services::similarity;
use crate::storage::MemoryStore;
use crate::Result;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Candidates fetched per requested result.
pub const DEFAULT_OVERFETCH_FACTOR: usize = 3;

/// Relevance calls allowed in flight for one retrieval.
pub const DEFAULT_MAX_CONCURRENT_SCORING: usize = 16;

/// Retrieval tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates fetched per requested result.
    pub overfetch_factor: usize,
    /// Relevance calls allowed in flight.
    pub max_concurrent_scoring: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
            max_concurrent_scoring: DEFAULT_MAX_CONCURRENT_SCORING,
        }
    }
}

/// Search, score, rank, budget.
pub struct RetrievalPipeline {
    store: Arc<dyn MemoryStore>,
    reviewer: Arc<ConsensusReviewer>,
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    /// Creates a pipeline with default tuning.
    #[must_use]
    pub fn new(store: Arc<dyn MemoryStore>, reviewer: Arc<ConsensusReviewer>) -> Self {
        Self {
            store,
            reviewer,
            config: RetrievalConfig::default(),
        }
    }

    /// Sets the tuning.
    #[must_use]
    pub const fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Active tuning.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Returns the most relevant memories for the request.
    ///
    /// Every returned memory carries its `relevance_score`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OperationFailed`] if the candidate search
    /// fails. Collaborator failures only lower scores.
    #[instrument(
        name = "mnemos.retrieve",
        skip(self, request),
        fields(query_len = request.query.len(), limit = request.limit, kinds = request.kinds.len())
    )]
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<Memory>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let candidate_limit = request
            .limit
            .saturating_mul(self.config.overfetch_factor.max(1));
        let candidates = self
            .store
            .search(&request.query, &request.filter(), candidate_limit)?;
        let candidate_count = candidates.len();

        let scored = self.score_all(candidates, &request.query).await;

        let mut ranked = rank_candidates(scored);
        ranked.truncate(request.limit);
        let mut results = apply_token_budget(ranked, request.max_tokens);
        if request.deduplicate {
            results = similarity::deduplicate(results, request.similarity_threshold);
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("memory_retrieve_duration_ms").record(elapsed_ms);
        tracing::debug!(
            candidates = candidate_count,
            returned = results.len(),
            elapsed_ms,
            "Retrieval complete"
        );

        Ok(results)
    }

    async fn score_all(&self, candidates: Vec<Memory>, query: &str) -> Vec<Memory> {
        let reviewer = self.reviewer.as_ref();
        stream::iter(candidates)
            .map(|memory| async move {
                let score = reviewer.score_relevance(&memory, query).await;
                memory.with_relevance(score)
            })
            .buffered(self.config.max_concurrent_scoring.max(1))
            .collect()
            .await
    }
}

/// Sorts by relevance descending, then newest first, then id ascending.
///
/// Memories without a score rank as zero.
#[must_use]
pub fn rank_candidates(mut memories: Vec<Memory>) -> Vec<Memory> {
    memories.sort_by(compare_ranked);
    memories
}

fn compare_ranked(a: &Memory, b: &Memory) -> Ordering {
    let score_a = a.relevance_score.unwrap_or(0.0);
    let score_b = b.relevance_score.unwrap_or(0.0);
    score_b
        .total_cmp(&score_a)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
}

/// Keeps memories in order until the next one would overflow `max_tokens`.
///
/// Stops at the first memory that does not fit, even if a later, smaller
/// memory would.
#[must_use]
pub fn apply_token_budget(memories: Vec<Memory>, max_tokens: Option<usize>) -> Vec<Memory> {
    let Some(budget) = max_tokens else {
        return memories;
    };

    let mut used = 0usize;
    let mut kept = Vec::with_capacity(memories.len());
    for memory in memories {
        let next = used.saturating_add(memory.token_count);
        if next > budget {
            break;
        }
        used = next;
        kept.push(memory);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryDraft, MemoryId, MemoryKind};
    use crate::review::testing::{CallCounter, FailingScorer, FixedRelevanceScorer, FixedStorageScorer};
    use crate::review::{RelevanceScorer, StorageScorer};
    use crate::storage::SqliteMemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn memory(id: &str, score: f64, minutes: i64, tokens: usize) -> Memory {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        MemoryDraft::new(MemoryKind::Semantic, format!("memory {id}"))
            .into_memory(MemoryId::new(id), created, tokens)
            .with_relevance(score)
    }

    fn ids(memories: &[Memory]) -> Vec<&str> {
        memories.iter().map(|m| m.id.as_str()).collect()
    }

    fn storage_panel() -> Vec<Arc<dyn StorageScorer>> {
        vec![
            Arc::new(FixedStorageScorer::new("a", 8.0)),
            Arc::new(FixedStorageScorer::new("b", 8.0)),
            Arc::new(FixedStorageScorer::new("c", 8.0)),
        ]
    }

    #[test]
    fn test_rank_orders_by_score_then_recency_then_id() {
        let ranked = rank_candidates(vec![
            memory("c", 0.5, 0, 1),
            memory("b", 0.5, 10, 1),
            memory("a", 0.5, 10, 1),
            memory("d", 0.9, 0, 1),
        ]);
        assert_eq!(ids(&ranked), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_budget_stops_at_first_overflow() {
        let memories = vec![
            memory("a", 0.9, 0, 200),
            memory("b", 0.8, 0, 200),
            memory("c", 0.7, 0, 200),
            memory("d", 0.6, 0, 50),
        ];
        let kept = apply_token_budget(memories, Some(500));
        assert_eq!(ids(&kept), vec!["a", "b"]);
    }

    #[test]
    fn test_budget_none_keeps_all_and_zero_keeps_none() {
        let memories = vec![memory("a", 0.9, 0, 10), memory("b", 0.8, 0, 10)];
        assert_eq!(apply_token_budget(memories.clone(), None).len(), 2);
        assert!(apply_token_budget(memories, Some(0)).is_empty());
    }

    fn seeded_store(count: usize, tokens: usize) -> Arc<SqliteMemoryStore> {
        let store = SqliteMemoryStore::in_memory().unwrap();
        let base = Utc::now() - Duration::hours(1);
        for i in 0..count {
            let created = base + Duration::seconds(i64::try_from(i).unwrap());
            let memory = MemoryDraft::new(
                MemoryKind::Semantic,
                format!("deployment note number {i} about rollout windows"),
            )
            .into_memory(MemoryId::new(format!("semantic_{i:03}")), created, tokens);
            store.insert(&memory).unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_overfetch_scores_every_candidate() {
        let calls = CallCounter::new();
        let relevance: Vec<Arc<dyn RelevanceScorer>> = vec![
            Arc::new(FixedRelevanceScorer::new("x", 0.5).counting(calls.clone())),
            Arc::new(FixedRelevanceScorer::new("y", 0.5).counting(calls.clone())),
        ];
        let reviewer = Arc::new(ConsensusReviewer::new(storage_panel(), relevance).unwrap());
        let pipeline = RetrievalPipeline::new(seeded_store(20, 10), reviewer);

        let results = pipeline
            .retrieve(&RetrieveRequest::new("deployment").with_limit(4))
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
        // 12 candidates, two panel members each.
        assert_eq!(calls.get(), 24);
        assert!(results.iter().all(|m| m.relevance_score.is_some()));
    }

    #[tokio::test]
    async fn test_limit_zero_touches_nothing() {
        let calls = CallCounter::new();
        let relevance: Vec<Arc<dyn RelevanceScorer>> = vec![
            Arc::new(FixedRelevanceScorer::new("x", 0.5).counting(calls.clone())),
            Arc::new(FixedRelevanceScorer::new("y", 0.5).counting(calls.clone())),
        ];
        let reviewer = Arc::new(ConsensusReviewer::new(storage_panel(), relevance).unwrap());
        let pipeline = RetrievalPipeline::new(seeded_store(3, 10), reviewer);

        let results = pipeline
            .retrieve(&RetrieveRequest::new("").with_limit(0))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_scores_reorder_results() {
        let relevance: Vec<Arc<dyn RelevanceScorer>> = vec![
            Arc::new(FixedRelevanceScorer::from_fn("x", |m, _| {
                if m.id.as_str() == "semantic_000" { 1.0 } else { 0.1 }
            })),
            Arc::new(FixedRelevanceScorer::new("y", 0.5)),
        ];
        let reviewer = Arc::new(ConsensusReviewer::new(storage_panel(), relevance).unwrap());
        let pipeline = RetrievalPipeline::new(seeded_store(5, 10), reviewer);

        let results = pipeline
            .retrieve(&RetrieveRequest::new("").with_limit(2))
            .await
            .unwrap();
        // Oldest memory wins on score; the rest fall back to recency.
        assert_eq!(ids(&results), vec!["semantic_000", "semantic_004"]);
        assert!((results[0].relevance_score.unwrap() - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failing_panel_still_returns_results() {
        let relevance: Vec<Arc<dyn RelevanceScorer>> = vec![
            Arc::new(FailingScorer::new("x")),
            Arc::new(FailingScorer::new("y")),
        ];
        let reviewer = Arc::new(ConsensusReviewer::new(storage_panel(), relevance).unwrap());
        let pipeline = RetrievalPipeline::new(seeded_store(3, 10), reviewer);

        let results = pipeline
            .retrieve(&RetrieveRequest::new("rollout"))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|m| m.relevance_score == Some(0.0)));
    }

    #[tokio::test]
    async fn test_budget_applies_after_truncation() {
        let relevance: Vec<Arc<dyn RelevanceScorer>> = vec![
            Arc::new(FixedRelevanceScorer::new("x", 0.5)),
            Arc::new(FixedRelevanceScorer::new("y", 0.5)),
        ];
        let reviewer = Arc::new(ConsensusReviewer::new(storage_panel(), relevance).unwrap());
        let pipeline = RetrievalPipeline::new(seeded_store(20, 150), reviewer);

        let results = pipeline
            .retrieve(&RetrieveRequest::new("").with_limit(5).with_max_tokens(500))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().map(|m| m.token_count).sum::<usize>() <= 500);
    }
}
