//! Local heuristic scorers.
//!
//! These panels need no network access and answer instantly. They are the
//! default backend and a reasonable baseline for the LLM panels.

use super::{RelevanceScorer, ScoreVerdict, StorageScorer};
use crate::Result;
use crate::models::{Memory, MemoryDraft, Retention};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static DECISION_SIGNALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(decided|decision|chose|choosing|picked|selected|settled on)\b",
        r"(?i)\b(we('re| are|'ll| will) (going to |gonna )?use|let's use|switch(ed)? to)\b",
        r"(?i)\b(from now on|going forward|henceforth)\b",
    ])
});

static LEARNING_SIGNALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(learned|discovered|realized|found out|figured out)\b",
        r"(?i)\b(TIL|turns out|apparently)\b",
        r"(?i)\b(gotcha|caveat|quirk|edge case|root cause)\b",
    ])
});

static PROCEDURE_SIGNALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(to (build|deploy|release|run|test|install|configure)\b)",
        r"(?i)\b(steps?|first|then|finally|afterwards)\b.*\b(run|execute|call|set|open)\b",
        r"(?i)\b(command|script|workflow|recipe|checklist)\b",
    ])
});

static CONVENTION_SIGNALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(pattern|convention|standard|best practice|guideline|rule)\b",
        r"(?i)\b(always|never|must|should)\b.*\b(when|if|before|after)\b",
    ])
});

static BLOCKER_SIGNALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(fixed|solved|resolved|workaround)\b",
        r"(?i)\b(bug|regression|crash|deadlock|race condition)\b",
    ])
});

static IDENTIFIER: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"`[^`]+`|\b[a-z]+_[a-z0-9_]+\b|\b[a-z]+[A-Z]\w*\b|\b\w+\.(rs|toml|json|yaml|md|py|ts|sql)\b|(\./|/)[\w./-]+|\w+::\w+").ok()
});

static ACRONYM: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\b[A-Z]{2,}\w*\b").ok());

static NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\b\d+(\.\d+)*\b").ok());

static RATIONALE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)\b(because|since|so that|due to|in order to|instead of)\b").ok());

static DURABLE_LANGUAGE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\b(always|never|from now on|going forward|permanently|by default)\b").ok()
});

static TRANSIENT_LANGUAGE: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)\b(right now|for now|at the moment|currently|temporarily)\b",
        r"(?i)\b(wip|todo later|just testing|quick test|scratch)\b",
        r"(?i)\b(looking at|opening|reading) (the |this )?file\b",
    ])
});

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "i",
    "in", "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "we", "what", "when",
    "where", "which", "who", "why", "with",
];

/// Lowercase alphanumeric terms with stop words removed.
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

fn matches(pattern: &Lazy<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|p| p.is_match(text))
}

/// Scores a draft by the kinds of knowledge signals it contains.
#[derive(Debug, Default)]
pub struct SignalScorer;

impl SignalScorer {
    fn evaluate(content: &str) -> ScoreVerdict {
        let categories = [
            ("decision", &*DECISION_SIGNALS),
            ("learning", &*LEARNING_SIGNALS),
            ("procedure", &*PROCEDURE_SIGNALS),
            ("convention", &*CONVENTION_SIGNALS),
            ("fix", &*BLOCKER_SIGNALS),
        ];
        let found: Vec<&str> = categories
            .iter()
            .filter(|(_, patterns)| any_match(patterns, content))
            .map(|(name, _)| *name)
            .collect();

        if found.is_empty() {
            return ScoreVerdict::new(2.0, "no decision, learning, or procedure signals");
        }
        let extra = u32::try_from(found.len() - 1).unwrap_or(u32::MAX);
        let score = 2.0_f64.mul_add(f64::from(extra), 6.0);
        ScoreVerdict::new(score, format!("signals: {}", found.join(", ")))
    }
}

#[async_trait]
impl StorageScorer for SignalScorer {
    fn name(&self) -> &str {
        "signal"
    }

    async fn score_storage(&self, draft: &MemoryDraft) -> Result<ScoreVerdict> {
        Ok(Self::evaluate(&draft.content))
    }
}

/// Scores a draft by how concrete it is.
#[derive(Debug, Default)]
pub struct SpecificityScorer;

impl SpecificityScorer {
    fn evaluate(content: &str) -> ScoreVerdict {
        let mut score = 3.0;
        let mut notes = Vec::new();

        let words = content.split_whitespace().count();
        if words >= 8 {
            score += 1.0;
            notes.push("detailed");
        }
        if words >= 20 {
            score += 1.0;
        }
        if matches(&IDENTIFIER, content) {
            score += 2.0;
            notes.push("identifiers");
        }
        if matches(&ACRONYM, content) {
            score += 1.0;
            notes.push("named technology");
        }
        if matches(&NUMBER, content) {
            score += 1.0;
            notes.push("numbers");
        }
        if matches(&RATIONALE, content) {
            score += 1.0;
            notes.push("rationale");
        }

        let justification = if notes.is_empty() {
            "vague".to_string()
        } else {
            notes.join(", ")
        };
        ScoreVerdict::new(score, justification)
    }
}

#[async_trait]
impl StorageScorer for SpecificityScorer {
    fn name(&self) -> &str {
        "specificity"
    }

    async fn score_storage(&self, draft: &MemoryDraft) -> Result<ScoreVerdict> {
        Ok(Self::evaluate(&draft.content))
    }
}

/// Scores a draft by whether it will still matter later.
#[derive(Debug, Default)]
pub struct DurabilityScorer;

impl DurabilityScorer {
    fn evaluate(draft: &MemoryDraft) -> ScoreVerdict {
        let mut score: f64 = match draft.kind.retention() {
            Retention::Durable => 6.0,
            Retention::UntilFulfilled => 6.0,
            Retention::Session => 5.0,
        };
        let mut notes = vec![format!("{} retention", draft.kind)];

        if matches(&DURABLE_LANGUAGE, &draft.content) {
            score += 2.0;
            notes.push("lasting language".to_string());
        }
        if matches(&RATIONALE, &draft.content) {
            score += 1.0;
            notes.push("explains why".to_string());
        }
        let transient = TRANSIENT_LANGUAGE
            .iter()
            .filter(|p| p.is_match(&draft.content))
            .count();
        if transient > 0 {
            score -= 2.0 * f64::from(u32::try_from(transient).unwrap_or(u32::MAX));
            notes.push("transient language".to_string());
        }

        ScoreVerdict::new(score, notes.join(", "))
    }
}

#[async_trait]
impl StorageScorer for DurabilityScorer {
    fn name(&self) -> &str {
        "durability"
    }

    async fn score_storage(&self, draft: &MemoryDraft) -> Result<ScoreVerdict> {
        Ok(Self::evaluate(draft))
    }
}

/// Neutral relevance for a blank query, so recency decides the order.
const BLANK_QUERY_RELEVANCE: f64 = 0.5;

/// Fraction of query terms present in the memory (prefix match).
#[derive(Debug, Default)]
pub struct TermOverlapScorer;

impl TermOverlapScorer {
    fn evaluate(content: &str, query: &str) -> ScoreVerdict {
        let query_terms: HashSet<String> = terms(query).into_iter().collect();
        if query_terms.is_empty() {
            return ScoreVerdict::new(BLANK_QUERY_RELEVANCE, "blank query");
        }
        let content_terms = terms(content);
        let hits = query_terms
            .iter()
            .filter(|q| content_terms.iter().any(|c| c.starts_with(q.as_str())))
            .count();

        #[allow(clippy::cast_precision_loss)]
        let score = hits as f64 / query_terms.len() as f64;
        ScoreVerdict::new(score, format!("{hits}/{} query terms", query_terms.len()))
    }
}

#[async_trait]
impl RelevanceScorer for TermOverlapScorer {
    fn name(&self) -> &str {
        "term_overlap"
    }

    async fn score_relevance(&self, memory: &Memory, query: &str) -> Result<ScoreVerdict> {
        Ok(Self::evaluate(&memory.content, query))
    }
}

/// Rewards memories where the query terms appear together and in order.
#[derive(Debug, Default)]
pub struct PhraseProximityScorer;

impl PhraseProximityScorer {
    fn evaluate(content: &str, query: &str) -> ScoreVerdict {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return ScoreVerdict::new(BLANK_QUERY_RELEVANCE, "blank query");
        }
        let content_terms = terms(content);

        if query_terms.len() == 1 {
            let found = content_terms.iter().any(|c| c.starts_with(&query_terms[0]));
            return if found {
                ScoreVerdict::new(1.0, "term present")
            } else {
                ScoreVerdict::new(0.0, "term absent")
            };
        }

        let pairs = query_terms.len() - 1;
        let adjacent = query_terms
            .windows(2)
            .filter(|pair| {
                content_terms
                    .windows(2)
                    .any(|c| c[0].starts_with(&pair[0]) && c[1].starts_with(&pair[1]))
            })
            .count();

        #[allow(clippy::cast_precision_loss)]
        let score = adjacent as f64 / pairs as f64;
        ScoreVerdict::new(score, format!("{adjacent}/{pairs} adjacent pairs"))
    }
}

#[async_trait]
impl RelevanceScorer for PhraseProximityScorer {
    fn name(&self) -> &str {
        "phrase_proximity"
    }

    async fn score_relevance(&self, memory: &Memory, query: &str) -> Result<ScoreVerdict> {
        Ok(Self::evaluate(&memory.content, query))
    }
}

/// The three heuristic storage reviewers.
#[must_use]
pub fn heuristic_storage_panel() -> Vec<Arc<dyn StorageScorer>> {
    vec![
        Arc::new(SignalScorer),
        Arc::new(SpecificityScorer),
        Arc::new(DurabilityScorer),
    ]
}

/// The two heuristic relevance reviewers.
#[must_use]
pub fn heuristic_relevance_panel() -> Vec<Arc<dyn RelevanceScorer>> {
    vec![Arc::new(TermOverlapScorer), Arc::new(PhraseProximityScorer)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryKind;
    use crate::review::ConsensusReviewer;

    #[test]
    fn test_signal_scorer_counts_categories() {
        assert!((SignalScorer::evaluate("the sky").score - 2.0).abs() < f64::EPSILON);

        let verdict = SignalScorer::evaluate("We decided to use SQLite");
        assert!((verdict.score - 6.0).abs() < f64::EPSILON);
        assert!(verdict.justification.contains("decision"));

        let verdict =
            SignalScorer::evaluate("Decided on retries after we discovered the deadlock was fixed by ordering locks");
        assert!(verdict.score >= 10.0);
    }

    #[test]
    fn test_specificity_rewards_concrete_details() {
        let vague = SpecificityScorer::evaluate("something about the thing");
        let concrete = SpecificityScorer::evaluate(
            "Set `busy_timeout` to 5000 in src/storage/sqlite.rs because WAL writers contend",
        );
        assert!(concrete.score > vague.score);
        assert!(concrete.justification.contains("identifiers"));
        assert_eq!(vague.justification, "vague");
    }

    #[test]
    fn test_durability_penalizes_transient_language() {
        let durable = DurabilityScorer::evaluate(&MemoryDraft::new(
            MemoryKind::Decision,
            "Always run migrations before deploying",
        ));
        let transient = DurabilityScorer::evaluate(&MemoryDraft::new(
            MemoryKind::Working,
            "Currently looking at the file for now",
        ));
        assert!(durable.score >= 8.0);
        assert!(transient.score < 3.0);
    }

    #[test]
    fn test_term_overlap() {
        let verdict = TermOverlapScorer::evaluate("JWT authentication for the API", "auth jwt tokens");
        assert!((verdict.score - 2.0 / 3.0).abs() < 1e-9);
        assert!((TermOverlapScorer::evaluate("anything", "").score - 0.5).abs() < f64::EPSILON);
        assert!((TermOverlapScorer::evaluate("anything", "the of").score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_phrase_proximity() {
        let adjacent = PhraseProximityScorer::evaluate("configure connection pool size", "connection pool");
        let scattered = PhraseProximityScorer::evaluate("pool of workers for each connection", "connection pool");
        assert!((adjacent.score - 1.0).abs() < f64::EPSILON);
        assert!(scattered.score.abs() < f64::EPSILON);

        assert!((PhraseProximityScorer::evaluate("rust crate", "rust").score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_heuristic_panels_accept_a_concrete_decision() {
        let reviewer =
            ConsensusReviewer::new(heuristic_storage_panel(), heuristic_relevance_panel()).unwrap();
        let draft = MemoryDraft::new(
            MemoryKind::Decision,
            "Decided to use SQLite with WAL mode for session state because readers must not block the writer",
        );
        let result = reviewer.review_storage(&draft).await;
        assert!(result.score >= 6.0, "score was {}", result.score);

        let chatter = MemoryDraft::new(MemoryKind::Working, "currently looking at the file for now");
        assert!(reviewer.review_storage(&chatter).await.score < 6.0);
    }
}
