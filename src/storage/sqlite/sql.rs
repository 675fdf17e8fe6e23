//! SQL building helpers for the `SQLite` store.

use crate::models::SearchFilter;
use rusqlite::types::Value;

/// Builds a WHERE fragment from a search filter with numbered parameters.
///
/// Returns the clause (prefixed with ` AND ` when non-empty), the parameters
/// in order, and the next free parameter index.
pub fn build_filter_clause_numbered(
    filter: &SearchFilter,
    start_param: usize,
) -> (String, Vec<Value>, usize) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    let mut param_idx = start_param;

    if !filter.kinds.is_empty() {
        let placeholders: Vec<String> = filter
            .kinds
            .iter()
            .map(|kind| {
                let p = format!("?{param_idx}");
                param_idx += 1;
                params.push(Value::Text(kind.as_str().to_string()));
                p
            })
            .collect();
        conditions.push(format!("m.kind IN ({})", placeholders.join(",")));
    }

    if let Some(since) = filter.since {
        conditions.push(format!("m.created_at >= ?{param_idx}"));
        param_idx += 1;
        params.push(Value::Integer(since.timestamp_millis()));
    }

    if let Some(before) = filter.before {
        conditions.push(format!("m.created_at < ?{param_idx}"));
        param_idx += 1;
        params.push(Value::Integer(before.timestamp_millis()));
    }

    if let Some(ref session_id) = filter.session_id {
        conditions.push(format!(
            "json_extract(m.context, '$.session_id') = ?{param_idx}"
        ));
        param_idx += 1;
        params.push(Value::Text(session_id.clone()));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" AND {}", conditions.join(" AND "))
    };

    (clause, params, param_idx)
}

/// Converts free text into an FTS5 MATCH expression.
///
/// Each whitespace-separated term is quoted (escaping embedded quotes) and
/// prefix-matched, and terms are OR-ed together. Terms without any
/// alphanumeric character are dropped. Returns `None` when nothing
/// searchable remains.
pub fn build_fts_query(query: &str) -> Option<String> {
    let terms: Vec<&str> = query
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .collect();
    if terms.is_empty() {
        return None;
    }

    let estimated_len = terms.iter().map(|t| t.len() + 8).sum::<usize>();
    let mut fts_query = String::with_capacity(estimated_len);
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            fts_query.push_str(" OR ");
        }
        fts_query.push('"');
        for c in term.chars() {
            if c == '"' {
                fts_query.push_str("\"\"");
            } else {
                fts_query.push(c);
            }
        }
        fts_query.push_str("\"*");
    }
    Some(fts_query)
}

/// Converts a `usize` to an `SQLite` integer, saturating at `i64::MAX`.
pub fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
