//! Token counting.
//!
//! Budgets are enforced on the `token_count` stored with each memory, so the
//! counter only runs once, at write time.

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Returns the token count for `text`.
    fn count(&self, text: &str) -> usize;
}

/// Estimates tokens as one per four characters, rounded up.
///
/// Close enough to common BPE tokenizers for English prose to keep budgets
/// honest without shipping a vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimateCounter;

impl CharEstimateCounter {
    /// Characters per token.
    pub const CHARS_PER_TOKEN: usize = 4;
}

impl TokenCounter for CharEstimateCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(Self::CHARS_PER_TOKEN)
    }
}
