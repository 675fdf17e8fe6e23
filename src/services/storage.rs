//! Storage pipeline.
//!
//! Decides whether a candidate observation becomes a memory:
//!
//! 1. The trivial filter short-circuits obvious noise without any panel call
//! 2. The consensus reviewer scores the draft
//! 3. Drafts scoring below the threshold are rejected and remembered so the
//!    filter can drop repeats cheaply
//! 4. Accepted drafts get an id, a timestamp and a token count, then are
//!    inserted
//!
//! Only persistence errors reach the caller.

use crate::filter::{ContentHasher, TrivialFilter};
use crate::models::{MemoryId, StoreOutcome, StoreRequest};
use crate::review::ConsensusReviewer;
use crate::services::tokens::{CharEstimateCounter, TokenCounter};
use crate::storage::MemoryStore;
use crate::Result;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Consensus score a draft must reach to be stored.
pub const DEFAULT_STORE_THRESHOLD: f64 = 6.0;

/// Metadata key carrying the normalized content hash of a stored memory.
pub const CONTENT_HASH_KEY: &str = "content_hash";

/// Filter, review and persist.
pub struct StoragePipeline {
    store: Arc<dyn MemoryStore>,
    filter: Arc<TrivialFilter>,
    reviewer: Arc<ConsensusReviewer>,
    tokens: Arc<dyn TokenCounter>,
    threshold: f64,
}

impl StoragePipeline {
    /// Creates a pipeline with the default threshold and token estimator.
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        filter: Arc<TrivialFilter>,
        reviewer: Arc<ConsensusReviewer>,
    ) -> Self {
        Self {
            store,
            filter,
            reviewer,
            tokens: Arc::new(CharEstimateCounter),
            threshold: DEFAULT_STORE_THRESHOLD,
        }
    }

    /// Sets the acceptance threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the token counter used for new memories.
    #[must_use]
    pub fn with_token_counter(mut self, tokens: Arc<dyn TokenCounter>) -> Self {
        self.tokens = tokens;
        self
    }

    /// The acceptance threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Runs one storage attempt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OperationFailed`] if the insert fails.
    /// Collaborator failures never surface here.
    #[instrument(
        name = "mnemos.store",
        skip(self, request),
        fields(kind = %request.kind, content_len = request.content.len())
    )]
    pub async fn store(&self, request: StoreRequest) -> Result<StoreOutcome> {
        let start = Instant::now();

        if let Some(reason) = self.filter.explain(request.kind, &request.content) {
            record_outcome("filtered", start);
            return Ok(StoreOutcome::filtered(reason.as_str()));
        }

        let mut draft = request.into_draft();
        draft.metadata.insert(
            CONTENT_HASH_KEY.to_string(),
            Value::from(ContentHasher::hash(&draft.content)),
        );

        let consensus = self.reviewer.review_storage(&draft).await;
        if consensus.score < self.threshold {
            self.filter.record_rejection(draft.kind, &draft.content);
            tracing::info!(
                score = consensus.score,
                threshold = self.threshold,
                failures = consensus.failures.len(),
                "Memory rejected by consensus"
            );
            record_outcome("rejected", start);
            return Ok(StoreOutcome::rejected(&consensus, self.threshold));
        }

        let id = MemoryId::generate(draft.kind);
        let token_count = self.tokens.count(&draft.content);
        let memory = draft.into_memory(id.clone(), Utc::now(), token_count);

        if let Err(e) = self.store.insert(&memory) {
            record_outcome("error", start);
            return Err(e);
        }

        tracing::info!(
            memory_id = %id,
            score = consensus.score,
            token_count,
            "Memory stored"
        );
        record_outcome("stored", start);
        Ok(StoreOutcome::stored(id, consensus.score))
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_outcome(outcome: &'static str, start: Instant) {
    metrics::counter!("memory_store_outcomes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("memory_store_duration_ms", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64() * 1000.0);
}
