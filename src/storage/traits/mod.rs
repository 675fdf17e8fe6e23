//! Memory store trait.
//!
//! The store is the only shared mutable resource in the system. Writes are
//! append-only: a memory is inserted once and afterwards can only be deleted.
//!
//! # Error Modes
//!
//! Every method returns [`crate::Error::OperationFailed`] when the underlying
//! database fails. These are the only errors the pipelines surface to callers.
//!
//! # Implementor Notes
//!
//! - Methods use `&self` so stores can be shared as `Arc<dyn MemoryStore>`
//! - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
//! - `insert` must refuse an id that was ever issued before, even if the
//!   memory carrying it has since been deleted
//! - `relevance_score` is never stored; returned memories carry `None`

use crate::Result;
use crate::models::{Memory, MemoryId, MemoryStats, SearchFilter};

/// Durable, queryable persistence for memories.
pub trait MemoryStore: Send + Sync {
    /// Persists a new memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or the id was issued before.
    fn insert(&self, memory: &Memory) -> Result<()>;

    /// Fetches a memory by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, id: &MemoryId) -> Result<Option<Memory>>;

    /// Searches for memories matching a text query.
    ///
    /// A blank query lists memories newest first. Otherwise results are
    /// ordered by text-match quality.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<Memory>>;

    /// Deletes a single memory. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, id: &MemoryId) -> Result<bool>;

    /// Deletes every memory matching the filter and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for an empty filter, or an error
    /// if the delete fails.
    fn delete_matching(&self, filter: &SearchFilter) -> Result<usize>;

    /// Computes aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn stats(&self) -> Result<MemoryStats>;
}
