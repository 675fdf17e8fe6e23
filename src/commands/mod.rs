//! Command handlers.
//!
//! - `core.rs`: store, retrieve, stats, delete, clear-session, prune
//! - `config.rs`: configuration display
//! - `hook.rs`: agent lifecycle hooks

mod config;
mod core;
mod hook;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use mnemos::MemoryKind;

pub use config::cmd_config;
pub use core::{
    RetrieveArgs, StoreArgs, cmd_clear_session, cmd_delete, cmd_prune, cmd_retrieve, cmd_stats, cmd_store,
};
pub use hook::cmd_hook;

/// Hook events.
#[derive(Subcommand, Clone, Copy)]
pub enum HookEvent {
    /// User prompt submit hook.
    UserPromptSubmit,
    /// Task complete hook.
    TaskComplete,
    /// Session end hook.
    SessionEnd,
}

impl From<HookEvent> for mnemos::hooks::HookEvent {
    fn from(event: HookEvent) -> Self {
        match event {
            HookEvent::UserPromptSubmit => Self::UserPromptSubmit,
            HookEvent::TaskComplete => Self::TaskComplete,
            HookEvent::SessionEnd => Self::SessionEnd,
        }
    }
}

/// Parses a memory kind argument.
pub fn parse_kind(s: &str) -> Result<MemoryKind, String> {
    MemoryKind::parse(s).ok_or_else(|| {
        format!(
            "unknown kind '{s}' (expected one of: {})",
            MemoryKind::all()
                .iter()
                .map(MemoryKind::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

/// Parses a `key=value` pair.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        },
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

/// Parses an RFC 3339 timestamp.
pub fn parse_since(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{s}': {e}"))
}

/// Parses a similarity threshold in `[0, 1]`.
pub fn parse_similarity(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("invalid number '{s}': {e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("similarity must be between 0 and 1, got {value}"))
    }
}
