//! Sentence-level signal detection for hook payloads.

use crate::filter::ContentHasher;
use crate::models::MemoryKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DECISION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(we('re| are|'ll| will) (going to |gonna )?use|let's use|we use)\b",
        r"(?i)\b(decided|decision|chose|picked|selected|settled on|went with)\b",
        r"(?i)\b(from now on|going forward|henceforth)\b",
        r"(?i)\b(always|never) (do|use|call|run|deploy|commit|merge)\b",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static LEARNING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(learned|discovered|realized|found out|figured out)\b",
        r"(?i)\b(TIL|turns out|it appears that)\b",
        r"(?i)\b(gotcha|caveat|quirk|edge case|root cause)\b",
        r"(?i)\b(the (fix|problem|issue) (was|is))\b",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static INTENTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(remind me to|don't forget to|remember to)\b",
        r"(?i)\b(next time|later|tomorrow|next week|next sprint|after the release)\b.*\b(we|I)\s+(should|need to|must|will|have to)\b",
        r"(?i)\b(we|I)\s+(should|need to|must|have to)\b.*\b(next time|later|tomorrow|next week|next sprint|after the release)\b",
        r"(?i)^\s*(TODO|FIXME|follow[- ]up)\b",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static SENTENCE_BOUNDARY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[.!?]+(\s+|$)|\n+").ok());

/// Splits text into trimmed, non-empty sentences.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let Some(boundary) = SENTENCE_BOUNDARY.as_ref() else {
        return vec![text.trim()].into_iter().filter(|s| !s.is_empty()).collect();
    };
    boundary
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Sentences stating something to do later.
#[must_use]
pub fn detect_intentions(text: &str) -> Vec<String> {
    split_sentences(text)
        .into_iter()
        .filter(|sentence| INTENTION_PATTERNS.iter().any(|p| p.is_match(sentence)))
        .map(ToString::to_string)
        .collect()
}

fn classify(sentence: &str) -> Option<MemoryKind> {
    if DECISION_PATTERNS.iter().any(|p| p.is_match(sentence)) {
        Some(MemoryKind::Decision)
    } else if LEARNING_PATTERNS.iter().any(|p| p.is_match(sentence)) {
        Some(MemoryKind::Semantic)
    } else {
        None
    }
}

/// Decision and learning sentences across `texts`, first occurrence wins.
///
/// Sentences repeated with different case or spacing are reported once.
#[must_use]
pub fn extract_candidates<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<(MemoryKind, String)> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for text in texts {
        for sentence in split_sentences(text) {
            let Some(kind) = classify(sentence) else {
                continue;
            };
            if seen.insert(ContentHasher::normalize(sentence)) {
                candidates.push((kind, sentence.to_string()));
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First one. Second one!\n\nThird? v1.2 stays");
        assert_eq!(sentences, vec!["First one", "Second one", "Third", "v1.2 stays"]);
    }

    #[test_case("Remind me to rotate the staging keys", true ; "reminder")]
    #[test_case("Next week we should drop the legacy table", true ; "time then obligation")]
    #[test_case("We need to revisit pagination after the release", true ; "obligation then time")]
    #[test_case("TODO: add an index on created_at", true ; "todo prefix")]
    #[test_case("The build is green", false ; "plain statement")]
    fn test_intention_detection(sentence: &str, expected: bool) {
        assert_eq!(!detect_intentions(sentence).is_empty(), expected);
    }

    #[test]
    fn test_extract_candidates_classifies_and_dedups() {
        let transcript = "We decided to use SQLite for the cache. The tests pass. \
                          Turns out FTS5 needs the bundled build.";
        let working = ["we decided to use sqlite for the cache", "Lunch now"];

        let candidates = extract_candidates(std::iter::once(transcript).chain(working));
        assert_eq!(
            candidates,
            vec![
                (MemoryKind::Decision, "We decided to use SQLite for the cache".to_string()),
                (MemoryKind::Semantic, "Turns out FTS5 needs the bundled build".to_string()),
            ]
        );
    }
}
