//! Trivial content filter.
//!
//! A cheap, local gate in front of consensus review. Content that is too
//! short, has too few real words, is pure acknowledgement, has no letters at
//! all, or was just rejected by the panel never reaches the reviewers.
//! Rejections are remembered per kind: the panel judges a draft's kind along
//! with its text, so a rejection as working memory says nothing about the
//! same text as a decision.
//!
//! The filter never fails: any internal problem (a pattern that does not
//! compile, a poisoned cache lock) reads as "not trivial".

// Cache sizes are reported as gauges.
#![allow(clippy::cast_precision_loss)]

mod hasher;
mod recent;

pub use hasher::ContentHasher;
pub use recent::{DEFAULT_REJECTION_CAPACITY, DEFAULT_REJECTION_TTL, RecentRejections};

use crate::models::MemoryKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Acknowledgements, greetings, and filler that carry nothing worth keeping.
static FILLER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(hi|hello|hey|yo|good (morning|afternoon|evening))( there| all| everyone)?[\s!.,]*$",
        r"(?i)^(ok(ay)?|k|sure|yes|yep|yeah|no|nope|nah|fine|cool|nice|great|awesome|perfect|done|lgtm)[\s!.,]*$",
        r"(?i)^(thanks|thank you|thx|ty|cheers)( (so|very) much| a lot| again)?[\s!.,]*$",
        r"(?i)^(got it|sounds good|makes sense|will do|on it|no problem|np|all good|looks good( to me)?)[\s!.,]*$",
        r"(?i)^(hmm+|uh+|um+|ah+|oh+|lol|haha+)[\s!.,]*$",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Which rule classified content as trivial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrivialReason {
    /// Trimmed content shorter than the minimum length.
    TooShort,
    /// Content has no alphabetic character.
    NoAlphabetic,
    /// Greeting, acknowledgement, or filler.
    Filler,
    /// Fewer alphabetic words than the minimum.
    TooFewWords,
    /// The consensus panel rejected equivalent content recently.
    RecentlyRejected,
}

impl TrivialReason {
    /// Stable label for logs, metrics, and outcome reasons.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TooShort => "too_short",
            Self::NoAlphabetic => "no_alphabetic",
            Self::Filler => "filler",
            Self::TooFewWords => "too_few_words",
            Self::RecentlyRejected => "recently_rejected",
        }
    }
}

impl fmt::Display for TrivialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trivial filter thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum trimmed length in characters.
    pub min_chars: usize,
    /// Minimum number of words containing a letter.
    pub min_words: usize,
    /// Number of recent rejections remembered.
    pub rejection_cache_capacity: usize,
    /// How long a rejection is remembered.
    #[serde(with = "duration_secs")]
    pub rejection_ttl: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_chars: 10,
            min_words: 2,
            rejection_cache_capacity: DEFAULT_REJECTION_CAPACITY,
            rejection_ttl: DEFAULT_REJECTION_TTL,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Cheap gate that rejects low-value content before review.
pub struct TrivialFilter {
    config: FilterConfig,
    recent: RecentRejections,
}

impl TrivialFilter {
    /// Creates a filter with the given thresholds.
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        let recent = RecentRejections::new(config.rejection_cache_capacity, config.rejection_ttl);
        Self { config, recent }
    }

    /// Returns true if content of this kind should be discarded without
    /// review.
    #[must_use]
    pub fn is_trivial(&self, kind: MemoryKind, content: &str) -> bool {
        self.explain(kind, content).is_some()
    }

    /// Returns the first rule that classifies the content as trivial.
    #[must_use]
    pub fn explain(&self, kind: MemoryKind, content: &str) -> Option<TrivialReason> {
        let reason = self.classify(kind, content);
        if let Some(reason) = reason {
            tracing::debug!(rule = reason.as_str(), kind = %kind, "Trivial content filtered");
            metrics::counter!("trivial_filter_rejections_total", "rule" => reason.as_str())
                .increment(1);
        }
        reason
    }

    fn classify(&self, kind: MemoryKind, content: &str) -> Option<TrivialReason> {
        let trimmed = content.trim();

        if trimmed.chars().count() < self.config.min_chars {
            return Some(TrivialReason::TooShort);
        }
        if !trimmed.chars().any(char::is_alphabetic) {
            return Some(TrivialReason::NoAlphabetic);
        }
        if FILLER_PATTERNS.iter().any(|p| p.is_match(trimmed)) {
            return Some(TrivialReason::Filler);
        }
        let words = trimmed
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphabetic))
            .count();
        if words < self.config.min_words {
            return Some(TrivialReason::TooFewWords);
        }
        if self.recent.contains(kind, trimmed) {
            return Some(TrivialReason::RecentlyRejected);
        }
        None
    }

    /// Remembers content of a kind the consensus panel rejected.
    pub fn record_rejection(&self, kind: MemoryKind, content: &str) {
        self.recent.record(kind, content.trim());
    }

    /// Returns the active thresholds.
    #[must_use]
    pub const fn config(&self) -> &FilterConfig {
        &self.config
    }
}

impl Default for TrivialFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("ok", TrivialReason::TooShort ; "bare ack")]
    #[test_case("   hi   ", TrivialReason::TooShort ; "padded greeting")]
    #[test_case("1234567890 42", TrivialReason::NoAlphabetic ; "numbers only")]
    #[test_case("---- !!!! ????", TrivialReason::NoAlphabetic ; "punctuation only")]
    #[test_case("Thanks so much!", TrivialReason::Filler ; "thanks")]
    #[test_case("sounds good!!", TrivialReason::Filler ; "sounds good")]
    #[test_case("Good morning everyone", TrivialReason::Filler ; "greeting")]
    #[test_case("Supercalifragilistic", TrivialReason::TooFewWords ; "single long word")]
    #[test_case("1.2.3 deployed", TrivialReason::TooFewWords ; "one alphabetic word")]
    fn test_trivial_rules(content: &str, expected: TrivialReason) {
        let filter = TrivialFilter::default();
        assert_eq!(filter.explain(MemoryKind::Semantic, content), Some(expected));
        assert!(filter.is_trivial(MemoryKind::Decision, content));
    }

    #[test_case("Decided to use SQLite with WAL mode for the session store" ; "decision")]
    #[test_case("Run cargo test with --release before tagging" ; "procedure")]
    #[test_case("Thanks, the retry fix in the client resolved the flaky test" ; "ack with substance")]
    fn test_substantive_content_passes(content: &str) {
        assert!(!TrivialFilter::default().is_trivial(MemoryKind::Decision, content));
    }

    #[test]
    fn test_recent_rejection_is_trivial() {
        let filter = TrivialFilter::default();
        let content = "Maybe look at the logging setup sometime";
        assert!(!filter.is_trivial(MemoryKind::Semantic, content));

        filter.record_rejection(MemoryKind::Semantic, content);

        assert_eq!(
            filter.explain(MemoryKind::Semantic, "maybe look at the   logging setup sometime"),
            Some(TrivialReason::RecentlyRejected)
        );
    }

    #[test]
    fn test_rejection_is_scoped_to_kind() {
        let filter = TrivialFilter::default();
        let content = "Decided to retry the upload twice before failing";

        filter.record_rejection(MemoryKind::Working, content);

        assert!(filter.is_trivial(MemoryKind::Working, content));
        assert_eq!(filter.explain(MemoryKind::Decision, content), None);
    }

    #[test]
    fn test_is_trivial_does_not_record() {
        let filter = TrivialFilter::default();
        let content = "Maybe look at the logging setup sometime";
        for _ in 0..3 {
            assert!(!filter.is_trivial(MemoryKind::Semantic, content));
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let filter = TrivialFilter::new(FilterConfig {
            min_chars: 3,
            min_words: 1,
            ..FilterConfig::default()
        });
        assert!(!filter.is_trivial(MemoryKind::Semantic, "Rust"));
        assert_eq!(filter.explain(MemoryKind::Semantic, "ab"), Some(TrivialReason::TooShort));
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(TrivialReason::TooShort.to_string(), "too_short");
        assert_eq!(TrivialReason::RecentlyRejected.as_str(), "recently_rejected");
    }

    #[test]
    fn test_filter_config_toml_uses_seconds() {
        let config: FilterConfig = toml::from_str(
            "min_chars = 5\nmin_words = 1\nrejection_cache_capacity = 8\nrejection_ttl = 90\n",
        )
        .unwrap();
        assert_eq!(config.rejection_ttl, Duration::from_secs(90));
    }
}
