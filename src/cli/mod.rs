//! Command-line support shared by the binary.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `store` | Review and store a memory |
//! | `retrieve` | Ranked retrieval under a token budget |
//! | `stats` | Counts and sizes per kind |
//! | `delete` | Delete one memory by id |
//! | `clear-session` | Delete a session's working memory |
//! | `prune` | Delete memories of a kind older than a cutoff |
//! | `hook` | Agent lifecycle hooks (JSON on stdin and stdout) |
//! | `config` | Show the resolved configuration |
//!
//! # Example Usage
//!
//! ```bash
//! mnemos store --kind decision "Use PostgreSQL for primary storage"
//! mnemos retrieve "database storage" --limit 5 --max-tokens 800 --dedup
//! echo '{"session_id":"s1","prompt":"..."}' | mnemos hook user-prompt-submit
//! ```

mod factory;
mod hook;

pub use factory::{
    build_anthropic_client, build_coordinator, build_coordinator_with_store, build_llm_provider,
    build_ollama_client, build_reviewer,
};
pub use hook::{HOOK_DRAIN_TIMEOUT, hook_handler, run_hook};
