//! # Mnemos
//!
//! A consensus-reviewed memory store for AI agents.
//!
//! Mnemos decides which observations from an agent session are worth keeping,
//! persists them by kind, and surfaces the most relevant ones under a token
//! budget when they are needed again.
//!
//! ## Architecture
//!
//! - [`filter::TrivialFilter`] rejects obviously low-value content before any
//!   expensive review happens.
//! - [`review::ConsensusReviewer`] asks a fixed panel of scoring collaborators
//!   and averages their scores, substituting the panel minimum for any
//!   collaborator that fails.
//! - [`services::StoragePipeline`] and [`services::RetrievalPipeline`] wire
//!   the filter, reviewer and [`storage::MemoryStore`] together.
//! - [`services::Coordinator`] is the single entry point for callers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnemos::{MemoryKind, RetrieveRequest, StoreRequest};
//!
//! let outcome = coordinator
//!     .store(StoreRequest::new("Decided to use a relational store for session state", MemoryKind::Decision))
//!     .await?;
//! let memories = coordinator
//!     .retrieve(RetrieveRequest::new("session state").with_limit(5))
//!     .await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod filter;
pub mod hooks;
pub mod llm;
pub mod models;
pub mod observability;
pub mod review;
pub mod services;
pub mod storage;

pub use config::MnemosConfig;
pub use models::{
    ConsensusResult, Memory, MemoryDraft, MemoryId, MemoryKind, MemoryStats, RetrieveRequest,
    SearchFilter, StoreOutcome, StoreRequest,
};
pub use review::{ConsensusReviewer, RelevanceScorer, ScoreVerdict, StorageScorer};
pub use services::{Coordinator, RetrievalPipeline, StoragePipeline};
pub use storage::{MemoryStore, SqliteMemoryStore};

/// Error type for mnemos operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed panel, unknown memory kind, bad CLI arguments |
/// | `OperationFailed` | Database, filesystem or configuration failures |
/// | `ScorerFailed` | A scoring collaborator returned an error |
/// | `Timeout` | A scoring collaborator exceeded its deadline |
///
/// Only `OperationFailed` escapes the storage and retrieval pipelines.
/// Collaborator errors are absorbed by the consensus reviewer.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` reads or writes fail
    /// - Filesystem I/O errors occur
    /// - Configuration files cannot be parsed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A scoring collaborator failed.
    #[error("scorer '{scorer}' failed: {cause}")]
    ScorerFailed {
        /// Name of the collaborator.
        scorer: String,
        /// The underlying cause.
        cause: String,
    },

    /// A scoring collaborator did not answer in time.
    #[error("scorer '{scorer}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Name of the collaborator.
        scorer: String,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },
}

impl Error {
    /// Returns true if this error came from a scoring collaborator rather than
    /// from persistence.
    #[must_use]
    pub const fn is_collaborator_error(&self) -> bool {
        matches!(self, Self::ScorerFailed { .. } | Self::Timeout { .. })
    }
}

/// Result type alias for mnemos operations.
pub type Result<T> = std::result::Result<T, Error>;
