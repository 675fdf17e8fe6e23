//! Memory kinds and their retention semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of memory categories.
///
/// The kind is fixed at creation and drives retention: `Working` memories are
/// scoped to a session and cleared in bulk at session end, every other kind is
/// durable until explicitly deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// A durable decision or fact.
    #[default]
    Decision,
    /// A short-lived note that only matters within one session.
    Working,
    /// A reusable procedure.
    Procedural,
    /// A future intention.
    Prospective,
    /// A learned concept that applies across sessions.
    Semantic,
}

/// How long memories of a given kind are expected to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Cleared when the owning session ends.
    Session,
    /// Kept until an explicit delete or an external prune.
    Durable,
    /// Kept until the intention is fulfilled and deleted by the caller.
    UntilFulfilled,
}

impl MemoryKind {
    /// Returns all kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Decision,
            Self::Working,
            Self::Procedural,
            Self::Prospective,
            Self::Semantic,
        ]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Working => "working",
            Self::Procedural => "procedural",
            Self::Prospective => "prospective",
            Self::Semantic => "semantic",
        }
    }

    /// Parses a kind from a string, accepting plural forms.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "decision" | "decisions" | "fact" | "facts" => Some(Self::Decision),
            "working" | "work" => Some(Self::Working),
            "procedural" | "procedure" | "procedures" => Some(Self::Procedural),
            "prospective" | "intention" | "intentions" => Some(Self::Prospective),
            "semantic" | "concept" | "concepts" => Some(Self::Semantic),
            _ => None,
        }
    }

    /// Returns the retention policy for this kind.
    #[must_use]
    pub const fn retention(&self) -> Retention {
        match self {
            Self::Working => Retention::Session,
            Self::Prospective => Retention::UntilFulfilled,
            Self::Decision | Self::Procedural | Self::Semantic => Retention::Durable,
        }
    }

    /// Returns true if memories of this kind are cleared at session boundaries.
    #[must_use]
    pub const fn is_session_scoped(&self) -> bool {
        matches!(self.retention(), Retention::Session)
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::InvalidInput(format!("unknown memory kind: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for kind in MemoryKind::all() {
            assert_eq!(MemoryKind::parse(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn test_parse_aliases_and_case() {
        assert_eq!(MemoryKind::parse("Decisions"), Some(MemoryKind::Decision));
        assert_eq!(MemoryKind::parse(" WORKING "), Some(MemoryKind::Working));
        assert_eq!(MemoryKind::parse("procedure"), Some(MemoryKind::Procedural));
        assert_eq!(MemoryKind::parse("episodic"), None);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "nope".parse::<MemoryKind>().unwrap_err();
        assert!(err.to_string().contains("unknown memory kind"));
    }

    #[test]
    fn test_only_working_is_session_scoped() {
        let scoped: Vec<_> = MemoryKind::all()
            .iter()
            .filter(|k| k.is_session_scoped())
            .collect();
        assert_eq!(scoped, vec![&MemoryKind::Working]);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&MemoryKind::Prospective).unwrap();
        assert_eq!(json, "\"prospective\"");
        let back: MemoryKind = serde_json::from_str("\"semantic\"").unwrap();
        assert_eq!(back, MemoryKind::Semantic);
    }
}
