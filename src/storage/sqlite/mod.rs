//! `SQLite` memory store.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition, pragmas, transactions
//! - [`sql`]: filter clause and FTS5 query building
//! - [`memory_row`]: row conversion for [`Memory`](crate::models::Memory)
//! - [`metrics`]: operation metrics
//! - [`store`]: the [`SqliteMemoryStore`] itself

mod connection;
mod memory_row;
mod metrics;
mod sql;
mod store;

pub use connection::{acquire_lock, configure_connection, with_transaction};
pub use memory_row::{MemoryRow, build_memory_from_row};
pub use sql::{build_filter_clause_numbered, build_fts_query};
pub use store::SqliteMemoryStore;
