//! Pipelines and the coordinator that fronts them.
//!
//! Services orchestrate the filter, the consensus reviewer and the store.

mod coordinator;
mod retrieval;
pub mod similarity;
mod storage;
pub mod tokens;

pub use coordinator::Coordinator;
pub use retrieval::{
    DEFAULT_MAX_CONCURRENT_SCORING, DEFAULT_OVERFETCH_FACTOR, RetrievalConfig, RetrievalPipeline,
    apply_token_budget, rank_candidates,
};
pub use similarity::deduplicate;
pub use storage::{CONTENT_HASH_KEY, DEFAULT_STORE_THRESHOLD, StoragePipeline};
pub use tokens::{CharEstimateCounter, TokenCounter};
