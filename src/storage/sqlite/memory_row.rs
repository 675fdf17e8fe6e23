//! Row conversion between `SQLite` and [`Memory`].

use crate::models::{Attributes, Memory, MemoryId, MemoryKind};
use crate::{Error, Result};
use chrono::DateTime;
use rusqlite::Row;

/// Column list selected for every memory read, in [`MemoryRow`] order.
pub const MEMORY_COLUMNS: &str =
    "m.id, m.kind, m.content, m.created_at, m.token_count, m.metadata, m.context";

/// Raw memory row as stored.
#[derive(Debug)]
pub struct MemoryRow {
    /// Memory id.
    pub id: String,
    /// Kind string.
    pub kind: String,
    /// Content.
    pub content: String,
    /// Creation time in Unix milliseconds.
    pub created_at: i64,
    /// Token count.
    pub token_count: i64,
    /// Metadata JSON object.
    pub metadata: String,
    /// Context JSON object.
    pub context: String,
}

impl MemoryRow {
    /// Reads a row selected with [`MEMORY_COLUMNS`].
    pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            token_count: row.get(4)?,
            metadata: row.get(5)?,
            context: row.get(6)?,
        })
    }
}

/// Converts a raw row into a [`Memory`].
///
/// An unknown kind or malformed JSON means the database is corrupt, which is
/// reported as a persistence failure.
pub fn build_memory_from_row(row: MemoryRow) -> Result<Memory> {
    let kind = MemoryKind::parse(&row.kind).ok_or_else(|| Error::OperationFailed {
        operation: "decode_memory_row".to_string(),
        cause: format!("memory {} has unknown kind '{}'", row.id, row.kind),
    })?;

    let metadata = parse_attributes(&row.id, "metadata", &row.metadata)?;
    let context = parse_attributes(&row.id, "context", &row.context)?;

    Ok(Memory {
        id: MemoryId::new(row.id),
        kind,
        content: row.content,
        created_at: DateTime::from_timestamp_millis(row.created_at).unwrap_or_default(),
        token_count: usize::try_from(row.token_count).unwrap_or(0),
        metadata,
        context,
        relevance_score: None,
    })
}

fn parse_attributes(id: &str, column: &str, raw: &str) -> Result<Attributes> {
    serde_json::from_str(raw).map_err(|e| Error::OperationFailed {
        operation: "decode_memory_row".to_string(),
        cause: format!("memory {id} has invalid {column}: {e}"),
    })
}

/// Serializes an attribute map for storage.
pub fn encode_attributes(attributes: &Attributes) -> Result<String> {
    serde_json::to_string(attributes).map_err(|e| Error::OperationFailed {
        operation: "encode_attributes".to_string(),
        cause: e.to_string(),
    })
}
