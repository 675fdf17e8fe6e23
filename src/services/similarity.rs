//! Near-duplicate detection for retrieval results.

use crate::filter::ContentHasher;
use crate::models::Memory;
use std::collections::HashSet;

/// Word set of the normalized content.
#[must_use]
pub fn word_set(content: &str) -> HashSet<String> {
    ContentHasher::normalize(content)
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Jaccard similarity of two word sets.
///
/// Two empty sets are identical.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Jaccard similarity of two texts.
#[must_use]
pub fn content_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}

/// Drops every memory whose similarity to an already kept memory exceeds
/// `threshold`. Order is preserved, so earlier (higher ranked) memories win.
#[must_use]
pub fn deduplicate(memories: Vec<Memory>, threshold: f64) -> Vec<Memory> {
    let mut kept: Vec<Memory> = Vec::with_capacity(memories.len());
    let mut kept_sets: Vec<HashSet<String>> = Vec::with_capacity(memories.len());

    for memory in memories {
        let words = word_set(&memory.content);
        if kept_sets.iter().any(|seen| jaccard(seen, &words) > threshold) {
            tracing::debug!(memory_id = %memory.id, "Dropping near-duplicate memory");
            continue;
        }
        kept_sets.push(words);
        kept.push(memory);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryDraft, MemoryId, MemoryKind};
    use chrono::Utc;

    fn memory(id: &str, content: &str) -> Memory {
        MemoryDraft::new(MemoryKind::Semantic, content).into_memory(
            MemoryId::new(id),
            Utc::now(),
            10,
        )
    }

    #[test]
    fn test_similarity_ignores_case_and_punctuation() {
        let sim = content_similarity("Use SQLite for storage.", "use sqlite FOR storage");
        assert!((sim - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_partial_overlap() {
        // {a, b, c} vs {b, c, d}: 2 / 4
        let sim = content_similarity("a b c", "b c d");
        assert!((sim - 0.5).abs() < f64::EPSILON);
        assert!(content_similarity("alpha", "omega").abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_sets_are_identical() {
        assert!((content_similarity("", "  ") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deduplicate_keeps_first_of_near_duplicates() {
        let memories = vec![
            memory("a", "The deploy pipeline runs migrations before the canary"),
            memory("b", "the deploy pipeline runs migrations before the canary!"),
            memory("c", "Cache invalidation happens on every schema change"),
        ];
        let kept = deduplicate(memories, 0.85);
        let ids: Vec<_> = kept.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // {a, b, c} vs {b, c, d} is exactly 0.5, which does not exceed 0.5.
        let kept = deduplicate(vec![memory("a", "a b c"), memory("b", "b c d")], 0.5);
        assert_eq!(kept.len(), 2);
    }
}
