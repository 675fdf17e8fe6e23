//! Data models for mnemos.
//!
//! This module contains the core data structures used throughout the system.

mod consensus;
mod kind;
mod memory;
mod request;
mod stats;

pub use consensus::{ConsensusResult, PanelScore, StoreOutcome};
pub use kind::{MemoryKind, Retention};
pub use memory::{Attributes, Memory, MemoryDraft, MemoryId, SESSION_ID_KEY};
pub use request::{
    DEFAULT_RETRIEVE_LIMIT, DEFAULT_SIMILARITY_THRESHOLD, RetrieveRequest, SearchFilter,
    StoreRequest,
};
pub use stats::MemoryStats;
