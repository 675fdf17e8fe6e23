//! `SQLite` + FTS5 memory store.

use super::connection::{acquire_lock, configure_connection, with_transaction};
use super::memory_row::{MEMORY_COLUMNS, MemoryRow, build_memory_from_row, encode_attributes};
use super::metrics::{record_operation_metrics, status_of};
use super::sql::{build_filter_clause_numbered, build_fts_query, to_sql_int};
use crate::models::{Memory, MemoryId, MemoryKind, MemoryStats, SearchFilter};
use crate::storage::traits::MemoryStore;
use crate::{Error, Result};
use chrono::DateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

/// SQLite-backed memory store with a full-text index.
///
/// Every id ever inserted is recorded in an `issued_ids` table that survives
/// deletes, so an id can never be reused.
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteMemoryStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// Parent directories are created when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_data_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory stores).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn);

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                token_count INTEGER NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                context TEXT NOT NULL DEFAULT '{}'
            );
            CREATE TABLE IF NOT EXISTS issued_ids (
                id TEXT PRIMARY KEY
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
                id UNINDEXED,
                content
            );",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_schema".to_string(),
            cause: e.to_string(),
        })?;

        Self::create_indexes(&conn);
        Ok(())
    }

    fn create_indexes(conn: &Connection) {
        let indexes = [
            // Kind-scoped listing, newest first
            (
                "idx_memories_kind_created",
                "CREATE INDEX IF NOT EXISTS idx_memories_kind_created ON memories(kind, created_at DESC)",
            ),
            // Time-window filters and pruning
            (
                "idx_memories_created_at",
                "CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at DESC)",
            ),
            // Session-scoped clears
            (
                "idx_memories_session",
                "CREATE INDEX IF NOT EXISTS idx_memories_session ON memories(json_extract(context, '$.session_id'))",
            ),
        ];

        // A missing index only costs speed, so the store still opens.
        for (name, ddl) in indexes {
            if let Err(e) = conn.execute(ddl, []) {
                tracing::warn!(index = name, error = %e, "Failed to create index");
            }
        }
    }

    /// Names of the secondary indexes present on `memories`.
    #[cfg(test)]
    fn index_names(&self) -> Vec<String> {
        let conn = acquire_lock(&self.conn);
        let Ok(mut stmt) = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'memories' AND name LIKE 'idx_%' ORDER BY name",
        ) else {
            return Vec::new();
        };
        stmt.query_map([], |row| row.get::<_, String>(0))
            .map(|rows| rows.filter_map(std::result::Result::ok).collect())
            .unwrap_or_default()
    }

    fn query_memories(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<Memory>> {
        let mut stmt = conn.prepare(sql).map_err(|e| Error::OperationFailed {
            operation: "prepare_search".to_string(),
            cause: e.to_string(),
        })?;

        let rows = stmt
            .query_map(params_from_iter(params), MemoryRow::read)
            .map_err(|e| Error::OperationFailed {
                operation: "execute_search".to_string(),
                cause: e.to_string(),
            })?;

        let mut memories = Vec::new();
        for row in rows {
            let row = row.map_err(|e| Error::OperationFailed {
                operation: "read_search_row".to_string(),
                cause: e.to_string(),
            })?;
            memories.push(build_memory_from_row(row)?);
        }
        Ok(memories)
    }

    fn insert_inner(conn: &Connection, memory: &Memory) -> Result<()> {
        let metadata = encode_attributes(&memory.metadata)?;
        let context = encode_attributes(&memory.context)?;

        with_transaction(conn, |conn| {
            let fresh = conn
                .execute(
                    "INSERT OR IGNORE INTO issued_ids (id) VALUES (?1)",
                    params![memory.id.as_str()],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "record_issued_id".to_string(),
                    cause: e.to_string(),
                })?;
            if fresh == 0 {
                return Err(Error::OperationFailed {
                    operation: "insert_memory".to_string(),
                    cause: format!("id {} was already issued", memory.id),
                });
            }

            conn.execute(
                "INSERT INTO memories (id, kind, content, created_at, token_count, metadata, context)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    memory.id.as_str(),
                    memory.kind.as_str(),
                    memory.content,
                    memory.created_at.timestamp_millis(),
                    to_sql_int(memory.token_count),
                    metadata,
                    context,
                ],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "insert_memory".to_string(),
                cause: e.to_string(),
            })?;

            conn.execute(
                "INSERT INTO memories_fts (id, content) VALUES (?1, ?2)",
                params![memory.id.as_str(), memory.content],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "insert_fts".to_string(),
                cause: e.to_string(),
            })?;

            Ok(())
        })
    }

    fn search_inner(
        conn: &Connection,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<Memory>> {
        if query.trim().is_empty() {
            let (filter_clause, filter_params, next_param) = build_filter_clause_numbered(filter, 1);
            let sql = format!(
                "SELECT {MEMORY_COLUMNS}
                 FROM memories m
                 WHERE 1=1 {filter_clause}
                 ORDER BY m.created_at DESC, m.id ASC
                 LIMIT ?{next_param}"
            );
            let mut params = filter_params;
            params.push(Value::Integer(to_sql_int(limit)));
            return Self::query_memories(conn, &sql, params);
        }

        let Some(fts_query) = build_fts_query(query) else {
            return Ok(Vec::new());
        };

        // ?1 is the FTS query
        let (filter_clause, filter_params, next_param) = build_filter_clause_numbered(filter, 2);
        let sql = format!(
            "SELECT {MEMORY_COLUMNS}
             FROM memories_fts f
             JOIN memories m ON f.id = m.id
             WHERE memories_fts MATCH ?1 {filter_clause}
             ORDER BY bm25(memories_fts), m.created_at DESC
             LIMIT ?{next_param}"
        );
        let mut params = Vec::with_capacity(filter_params.len() + 2);
        params.push(Value::Text(fts_query));
        params.extend(filter_params);
        params.push(Value::Integer(to_sql_int(limit)));
        Self::query_memories(conn, &sql, params)
    }

    fn delete_matching_inner(conn: &Connection, filter: &SearchFilter) -> Result<usize> {
        let (filter_clause, filter_params, _) = build_filter_clause_numbered(filter, 1);

        with_transaction(conn, |conn| {
            // FTS rows first, while the memory rows still identify them
            conn.execute(
                &format!(
                    "DELETE FROM memories_fts WHERE id IN (
                        SELECT m.id FROM memories m WHERE 1=1 {filter_clause}
                    )"
                ),
                params_from_iter(filter_params.iter()),
            )
            .map_err(|e| Error::OperationFailed {
                operation: "delete_matching_fts".to_string(),
                cause: e.to_string(),
            })?;

            conn.execute(
                &format!(
                    "DELETE FROM memories WHERE id IN (
                        SELECT m.id FROM memories m WHERE 1=1 {filter_clause}
                    )"
                ),
                params_from_iter(filter_params.iter()),
            )
            .map_err(|e| Error::OperationFailed {
                operation: "delete_matching".to_string(),
                cause: e.to_string(),
            })
        })
    }

    fn stats_inner(conn: &Connection) -> Result<MemoryStats> {
        let mut stats = MemoryStats::default();

        let mut stmt = conn
            .prepare("SELECT kind, COUNT(*) FROM memories GROUP BY kind")
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_stats".to_string(),
                cause: e.to_string(),
            })?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| Error::OperationFailed {
                operation: "execute_stats".to_string(),
                cause: e.to_string(),
            })?;
        for row in rows {
            let (kind, count) = row.map_err(|e| Error::OperationFailed {
                operation: "read_stats_row".to_string(),
                cause: e.to_string(),
            })?;
            let Some(kind) = MemoryKind::parse(&kind) else {
                tracing::warn!(kind = %kind, "Skipping unknown kind in stats");
                continue;
            };
            let count = usize::try_from(count).unwrap_or(0);
            stats.by_kind.insert(kind, count);
            stats.total += count;
        }

        let (total_tokens, oldest, newest): (i64, Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT COALESCE(SUM(token_count), 0), MIN(created_at), MAX(created_at) FROM memories",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| Error::OperationFailed {
                operation: "aggregate_stats".to_string(),
                cause: e.to_string(),
            })?;

        stats.total_tokens = usize::try_from(total_tokens).unwrap_or(0);
        stats.oldest = oldest.and_then(DateTime::from_timestamp_millis);
        stats.newest = newest.and_then(DateTime::from_timestamp_millis);
        Ok(stats)
    }
}

impl MemoryStore for SqliteMemoryStore {
    #[instrument(skip(self, memory), fields(operation = "insert", memory.id = %memory.id, memory.kind = %memory.kind))]
    fn insert(&self, memory: &Memory) -> Result<()> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            Self::insert_inner(&conn, memory)
        };
        record_operation_metrics("insert", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "get", memory.id = %id))]
    fn get(&self, id: &MemoryId) -> Result<Option<Memory>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let row = conn
                .query_row(
                    &format!("SELECT {MEMORY_COLUMNS} FROM memories m WHERE m.id = ?1"),
                    params![id.as_str()],
                    MemoryRow::read,
                )
                .optional()
                .map_err(|e| Error::OperationFailed {
                    operation: "get_memory".to_string(),
                    cause: e.to_string(),
                })?;
            row.map(build_memory_from_row).transpose()
        })();
        record_operation_metrics("get", start, status_of(&result));
        result
    }

    #[instrument(skip(self, query, filter), fields(operation = "search", query_length = query.len()))]
    fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<Memory>> {
        let start = Instant::now();
        let result = if limit == 0 {
            Ok(Vec::new())
        } else {
            let conn = acquire_lock(&self.conn);
            Self::search_inner(&conn, query, filter, limit)
        };
        record_operation_metrics("search", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "delete", memory.id = %id))]
    fn delete(&self, id: &MemoryId) -> Result<bool> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            with_transaction(&conn, |conn| {
                conn.execute(
                    "DELETE FROM memories_fts WHERE id = ?1",
                    params![id.as_str()],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_fts".to_string(),
                    cause: e.to_string(),
                })?;
                let removed = conn
                    .execute("DELETE FROM memories WHERE id = ?1", params![id.as_str()])
                    .map_err(|e| Error::OperationFailed {
                        operation: "delete_memory".to_string(),
                        cause: e.to_string(),
                    })?;
                Ok(removed > 0)
            })
        };
        record_operation_metrics("delete", start, status_of(&result));
        result
    }

    #[instrument(skip(self, filter), fields(operation = "delete_matching"))]
    fn delete_matching(&self, filter: &SearchFilter) -> Result<usize> {
        if filter.is_empty() {
            return Err(Error::InvalidInput(
                "refusing to delete with an empty filter".to_string(),
            ));
        }

        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            Self::delete_matching_inner(&conn, filter)
        };
        record_operation_metrics("delete_matching", start, status_of(&result));
        if let Ok(count) = result {
            tracing::debug!(count, "Deleted matching memories");
        }
        result
    }

    #[instrument(skip(self), fields(operation = "stats"))]
    fn stats(&self) -> Result<MemoryStats> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            Self::stats_inner(&conn)
        };
        record_operation_metrics("stats", start, status_of(&result));
        result
    }
}
