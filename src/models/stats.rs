//! Aggregate statistics over the memory store.

use super::MemoryKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts and sizes across all stored memories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Number of memories.
    pub total: usize,
    /// Number of memories per kind; every kind is present.
    pub by_kind: BTreeMap<MemoryKind, usize>,
    /// Sum of `token_count` across memories.
    pub total_tokens: usize,
    /// Creation time of the oldest memory.
    pub oldest: Option<DateTime<Utc>>,
    /// Creation time of the newest memory.
    pub newest: Option<DateTime<Utc>>,
}

impl Default for MemoryStats {
    fn default() -> Self {
        Self {
            total: 0,
            by_kind: MemoryKind::all().iter().map(|k| (*k, 0)).collect(),
            total_tokens: 0,
            oldest: None,
            newest: None,
        }
    }
}

impl MemoryStats {
    /// Returns the count for a single kind.
    #[must_use]
    pub fn count(&self, kind: MemoryKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}
