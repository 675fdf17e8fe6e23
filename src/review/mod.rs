//! Consensus review.
//!
//! Storage and relevance decisions are delegated to panels of opaque scoring
//! collaborators. The [`ConsensusReviewer`] owns the arithmetic: it asks every
//! member concurrently, clamps what comes back, substitutes the panel minimum
//! for anyone that failed, and averages.
//!
//! Collaborators are slow (seconds) and unreliable. Timeouts and circuit
//! breaking belong at the collaborator boundary ([`ResilientScorer`]), not in
//! the reviewer.

mod consensus;
mod heuristic;
mod llm_scorer;
mod resilience;
pub mod testing;

pub use consensus::{ConsensusReviewer, RELEVANCE_PANEL_SIZE, STORAGE_PANEL_SIZE};
pub use heuristic::{
    DurabilityScorer, PhraseProximityScorer, SignalScorer, SpecificityScorer, TermOverlapScorer,
    heuristic_relevance_panel, heuristic_storage_panel,
};
pub use llm_scorer::{
    LlmRelevanceScorer, LlmStorageScorer, RelevanceLens, ReviewerPersona, llm_relevance_panel,
    llm_storage_panel,
};
pub use resilience::{ResilientScorer, ScorerResilienceConfig};

use crate::Result;
use crate::models::{Memory, MemoryDraft};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lowest storage score.
pub const STORAGE_SCORE_MIN: f64 = 0.0;
/// Highest storage score.
pub const STORAGE_SCORE_MAX: f64 = 10.0;
/// Lowest relevance score.
pub const RELEVANCE_SCORE_MIN: f64 = 0.0;
/// Highest relevance score.
pub const RELEVANCE_SCORE_MAX: f64 = 1.0;

/// A single collaborator's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreVerdict {
    /// Raw score; the reviewer clamps it into the panel range.
    pub score: f64,
    /// Why the collaborator scored it this way.
    #[serde(default)]
    pub justification: String,
}

impl ScoreVerdict {
    /// Creates a verdict.
    #[must_use]
    pub fn new(score: f64, justification: impl Into<String>) -> Self {
        Self {
            score,
            justification: justification.into(),
        }
    }
}

/// Judges whether a draft is worth persisting, on a 0 to 10 scale.
#[async_trait]
pub trait StorageScorer: Send + Sync {
    /// Unique name within the panel.
    fn name(&self) -> &str;

    /// Scores a draft.
    ///
    /// # Errors
    ///
    /// Any error is treated by the reviewer as the lowest score.
    async fn score_storage(&self, draft: &MemoryDraft) -> Result<ScoreVerdict>;
}

/// Judges how relevant a memory is to a query, on a 0.0 to 1.0 scale.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Unique name within the panel.
    fn name(&self) -> &str;

    /// Scores a memory against a query.
    ///
    /// # Errors
    ///
    /// Any error is treated by the reviewer as the lowest score.
    async fn score_relevance(&self, memory: &Memory, query: &str) -> Result<ScoreVerdict>;
}
