//! Content normalization and hashing.
//!
//! Content is normalized before hashing so that trivial formatting
//! differences (case, surrounding or repeated whitespace) hash the same.

use sha2::{Digest, Sha256};

/// Normalizes and hashes memory content.
///
/// # Example
///
/// ```rust
/// use mnemos::filter::ContentHasher;
///
/// let hash = ContentHasher::hash("Use PostgreSQL for primary storage");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, ContentHasher::hash("  use  postgresql  for  primary  storage "));
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Returns the lowercase hex SHA256 of the normalized content.
    #[must_use]
    pub fn hash(content: &str) -> String {
        let normalized = Self::normalize(content);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Trims, lowercases, and collapses whitespace runs to single spaces.
    ///
    /// ```rust
    /// use mnemos::filter::ContentHasher;
    ///
    /// assert_eq!(ContentHasher::normalize("  Hello   WORLD  "), "hello world");
    /// ```
    #[must_use]
    pub fn normalize(content: &str) -> String {
        content
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
