//! Recently rejected content cache.
//!
//! Content that the consensus panel just rejected is remembered for a while
//! so that resubmitting it does not cost another review. Entries are keyed on
//! the kind plus the normalized content hash.

use super::hasher::ContentHasher;
use crate::models::MemoryKind;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default number of remembered rejections.
pub const DEFAULT_REJECTION_CAPACITY: usize = 512;

/// Default time a rejection is remembered.
pub const DEFAULT_REJECTION_TTL: Duration = Duration::from_secs(3600);

/// LRU cache of `(kind, normalized content)` hashes with TTL expiry.
///
/// # Lock Poisoning
///
/// Poisoning fails open: a poisoned lock reads as "not recently rejected"
/// and recording is skipped. Missing a recent rejection only costs one more
/// review.
pub struct RecentRejections {
    cache: RwLock<LruCache<String, Instant>>,
    ttl: Duration,
}

impl RecentRejections {
    /// Creates a cache. A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Returns true if equivalent content of this kind was rejected within
    /// the TTL.
    #[must_use]
    pub fn contains(&self, kind: MemoryKind, content: &str) -> bool {
        let hash = cache_key(kind, content);
        let Ok(cache) = self.cache.read() else {
            return false;
        };
        cache
            .peek(&hash)
            .is_some_and(|rejected_at| rejected_at.elapsed() <= self.ttl)
    }

    /// Remembers a rejection of `content` as `kind`.
    pub fn record(&self, kind: MemoryKind, content: &str) {
        let hash = cache_key(kind, content);
        if let Ok(mut cache) = self.cache.write() {
            cache.put(hash, Instant::now());
            metrics::gauge!("trivial_filter_rejection_cache_size").set(cache.len() as f64);
        }
    }

    /// Number of entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn cache_key(kind: MemoryKind, content: &str) -> String {
    format!("{}:{}", kind.as_str(), ContentHasher::hash(content))
}

impl Default for RecentRejections {
    fn default() -> Self {
        Self::new(DEFAULT_REJECTION_CAPACITY, DEFAULT_REJECTION_TTL)
    }
}
