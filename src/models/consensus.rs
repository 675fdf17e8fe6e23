//! Consensus review results and storage outcomes.

use super::MemoryId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One collaborator's contribution to a review.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelScore {
    /// Collaborator name.
    pub name: String,
    /// Score after clamping, or the panel minimum on failure.
    pub score: f64,
    /// Collaborator justification, or the failure description.
    pub justification: String,
    /// Whether the score was substituted because the collaborator failed.
    pub failed: bool,
}

/// Aggregate of a panel review. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusResult {
    /// Arithmetic mean of the panel's scores.
    pub score: f64,
    /// Score per collaborator.
    pub scores: BTreeMap<String, f64>,
    /// Justification per collaborator.
    pub justifications: BTreeMap<String, String>,
    /// Collaborators whose score was replaced with the panel minimum.
    pub failures: Vec<String>,
}

impl ConsensusResult {
    /// Aggregates panel scores into a consensus.
    ///
    /// An empty panel yields a score of zero.
    #[must_use]
    pub fn from_panel(entries: Vec<PanelScore>) -> Self {
        let mut scores = BTreeMap::new();
        let mut justifications = BTreeMap::new();
        let mut failures = Vec::new();
        let mut total = 0.0;
        let count = entries.len();

        for entry in entries {
            total += entry.score;
            if entry.failed {
                failures.push(entry.name.clone());
            }
            scores.insert(entry.name.clone(), entry.score);
            justifications.insert(entry.name, entry.justification);
        }

        failures.sort();

        #[allow(clippy::cast_precision_loss)]
        let score = if count == 0 { 0.0 } else { total / count as f64 };

        Self {
            score,
            scores,
            justifications,
            failures,
        }
    }

    /// Renders every collaborator's score and justification on one line.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (name, score) in &self.scores {
            if !out.is_empty() {
                out.push_str("; ");
            }
            let justification = self
                .justifications
                .get(name)
                .map_or("", String::as_str);
            let _ = write!(out, "{name}={score:.1} ({justification})");
        }
        out
    }
}

/// Return contract of every storage attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreOutcome {
    /// Whether a memory was written.
    pub accepted: bool,
    /// Identifier of the new memory when accepted.
    pub memory_id: Option<MemoryId>,
    /// Consensus score; zero when the trivial filter short-circuited.
    pub consensus_score: f64,
    /// Human-readable explanation.
    pub reason: String,
}

impl StoreOutcome {
    /// Outcome for content persisted after review.
    #[must_use]
    pub fn stored(memory_id: MemoryId, consensus_score: f64) -> Self {
        Self {
            accepted: true,
            memory_id: Some(memory_id),
            consensus_score,
            reason: "stored".to_string(),
        }
    }

    /// Outcome for content rejected by the trivial filter.
    #[must_use]
    pub fn filtered(rule: &str) -> Self {
        Self {
            accepted: false,
            memory_id: None,
            consensus_score: 0.0,
            reason: format!("trivial content filtered ({rule})"),
        }
    }

    /// Outcome for content the panel scored below threshold.
    #[must_use]
    pub fn rejected(consensus: &ConsensusResult, threshold: f64) -> Self {
        Self {
            accepted: false,
            memory_id: None,
            consensus_score: consensus.score,
            reason: format!(
                "consensus score {:.2} below threshold {threshold:.2}: {}",
                consensus.score,
                consensus.summary()
            ),
        }
    }
}
