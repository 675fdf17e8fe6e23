//! Storage layer.
//!
//! [`MemoryStore`] is the persistence seam; [`SqliteMemoryStore`] is the
//! `SQLite` + FTS5 implementation.

// Token counts and row counts are far below the precision limit.
#![allow(clippy::cast_precision_loss)]
// Guards are held for the whole statement sequence on purpose.
#![allow(clippy::significant_drop_tightening)]

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteMemoryStore;
pub use traits::MemoryStore;
