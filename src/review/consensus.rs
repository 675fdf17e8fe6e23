//! Panel aggregation with fail-safe-low substitution.

use super::{
    RELEVANCE_SCORE_MAX, RELEVANCE_SCORE_MIN, RelevanceScorer, STORAGE_SCORE_MAX,
    STORAGE_SCORE_MIN, ScoreVerdict, StorageScorer,
};
use crate::models::{ConsensusResult, Memory, MemoryDraft, PanelScore};
use crate::{Error, Result};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Number of collaborators on the storage panel.
pub const STORAGE_PANEL_SIZE: usize = 3;

/// Number of collaborators on the relevance panel.
pub const RELEVANCE_PANEL_SIZE: usize = 2;

/// Fixed storage and relevance panels.
///
/// Every member is always asked and always counted. A member that errors or
/// returns a non-finite score contributes the panel minimum, so failures can
/// only lower the consensus. Out-of-range scores are clamped.
pub struct ConsensusReviewer {
    storage_panel: Vec<Arc<dyn StorageScorer>>,
    relevance_panel: Vec<Arc<dyn RelevanceScorer>>,
}

impl ConsensusReviewer {
    /// Builds a reviewer from its two panels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a panel has the wrong size or two
    /// members share a name.
    pub fn new(
        storage_panel: Vec<Arc<dyn StorageScorer>>,
        relevance_panel: Vec<Arc<dyn RelevanceScorer>>,
    ) -> Result<Self> {
        validate_panel(
            "storage",
            storage_panel.iter().map(|s| s.name()),
            STORAGE_PANEL_SIZE,
        )?;
        validate_panel(
            "relevance",
            relevance_panel.iter().map(|s| s.name()),
            RELEVANCE_PANEL_SIZE,
        )?;
        Ok(Self {
            storage_panel,
            relevance_panel,
        })
    }

    /// Asks the storage panel whether a draft is worth keeping.
    #[instrument(skip(self, draft), fields(kind = %draft.kind, content_length = draft.content.len()))]
    pub async fn review_storage(&self, draft: &MemoryDraft) -> ConsensusResult {
        let calls = self.storage_panel.iter().map(|scorer| async move {
            let result = scorer.score_storage(draft).await;
            settle(scorer.name(), result, STORAGE_SCORE_MIN, STORAGE_SCORE_MAX)
        });
        let consensus = ConsensusResult::from_panel(join_all(calls).await);

        metrics::counter!("consensus_reviews_total", "mode" => "storage").increment(1);
        tracing::debug!(
            score = consensus.score,
            failures = consensus.failures.len(),
            "Storage review complete"
        );
        consensus
    }

    /// Asks the relevance panel how well a memory answers a query.
    pub async fn review_relevance(&self, memory: &Memory, query: &str) -> ConsensusResult {
        let calls = self.relevance_panel.iter().map(|scorer| async move {
            let result = scorer.score_relevance(memory, query).await;
            settle(
                scorer.name(),
                result,
                RELEVANCE_SCORE_MIN,
                RELEVANCE_SCORE_MAX,
            )
        });
        let consensus = ConsensusResult::from_panel(join_all(calls).await);

        metrics::counter!("consensus_reviews_total", "mode" => "relevance").increment(1);
        consensus
    }

    /// Relevance consensus score in `[0.0, 1.0]`.
    pub async fn score_relevance(&self, memory: &Memory, query: &str) -> f64 {
        self.review_relevance(memory, query).await.score
    }

    /// Names of the storage panel members, in panel order.
    #[must_use]
    pub fn storage_panel_names(&self) -> Vec<&str> {
        self.storage_panel.iter().map(|s| s.name()).collect()
    }

    /// Names of the relevance panel members, in panel order.
    #[must_use]
    pub fn relevance_panel_names(&self) -> Vec<&str> {
        self.relevance_panel.iter().map(|s| s.name()).collect()
    }
}

fn validate_panel<'a>(
    panel: &str,
    names: impl Iterator<Item = &'a str>,
    expected: usize,
) -> Result<()> {
    let names: Vec<&str> = names.collect();
    if names.len() != expected {
        return Err(Error::InvalidInput(format!(
            "{panel} panel needs exactly {expected} scorers, got {}",
            names.len()
        )));
    }
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::InvalidInput(format!(
                "{panel} panel has duplicate scorer '{name}'"
            )));
        }
    }
    Ok(())
}

/// Turns a collaborator result into a panel entry.
fn settle(name: &str, result: Result<ScoreVerdict>, min: f64, max: f64) -> PanelScore {
    match result {
        Ok(verdict) if verdict.score.is_finite() => PanelScore {
            name: name.to_string(),
            score: verdict.score.clamp(min, max),
            justification: verdict.justification,
            failed: false,
        },
        Ok(verdict) => {
            tracing::warn!(scorer = name, score = verdict.score, "Non-finite score, using panel minimum");
            metrics::counter!("consensus_collaborator_failures_total", "scorer" => name.to_string())
                .increment(1);
            PanelScore {
                name: name.to_string(),
                score: min,
                justification: format!("non-finite score {}", verdict.score),
                failed: true,
            }
        },
        Err(e) => {
            tracing::warn!(scorer = name, error = %e, "Scorer failed, using panel minimum");
            metrics::counter!("consensus_collaborator_failures_total", "scorer" => name.to_string())
                .increment(1);
            PanelScore {
                name: name.to_string(),
                score: min,
                justification: format!("failed: {e}"),
                failed: true,
            }
        },
    }
}
