//! Session-lifecycle hooks.
//!
//! An agent host calls `mnemos hook <event>` with a JSON payload on stdin and
//! reads a JSON reply from stdout. Handlers turn those events into storage
//! and retrieval calls on the [`Coordinator`](crate::services::Coordinator).
//!
//! | Event | Handler | Reply |
//! |-------|---------|-------|
//! | `user-prompt-submit` | [`UserPromptHandler`] | Relevant memories as `additionalContext` |
//! | `task-complete` | [`TaskCompleteHandler`] | `{}` |
//! | `session-end` | [`SessionEndHandler`] | `{}` |
//!
//! Context-bearing replies look like:
//!
//! ```json
//! {
//!   "hookSpecificOutput": {
//!     "hookEventName": "UserPromptSubmit",
//!     "additionalContext": "# Memory Context\n\n..."
//!   }
//! }
//! ```
//!
//! Malformed input is treated as an empty payload. A hook never fails the
//! host's session: the CLI logs handler errors and prints `{}`.

mod session_end;
mod signals;
mod task_complete;
mod user_prompt;

pub use session_end::SessionEndHandler;
pub use signals::{detect_intentions, extract_candidates, split_sentences};
pub use task_complete::TaskCompleteHandler;
pub use user_prompt::UserPromptHandler;

use crate::models::Memory;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;
use std::str::FromStr;

/// Context key under which hooks record where a memory came from.
pub const SOURCE_KEY: &str = "source";

/// Lifecycle events mnemos handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// The user submitted a prompt.
    UserPromptSubmit,
    /// The agent finished a task.
    TaskComplete,
    /// The session is ending.
    SessionEnd,
}

impl HookEvent {
    /// CLI name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UserPromptSubmit => "user-prompt-submit",
            Self::TaskComplete => "task-complete",
            Self::SessionEnd => "session-end",
        }
    }

    /// Name used in `hookEventName`.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::TaskComplete => "TaskComplete",
            Self::SessionEnd => "SessionEnd",
        }
    }
}

impl FromStr for HookEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "user-prompt-submit" | "userpromptsubmit" => Ok(Self::UserPromptSubmit),
            "task-complete" | "taskcomplete" => Ok(Self::TaskComplete),
            "session-end" | "sessionend" | "stop" => Ok(Self::SessionEnd),
            other => Err(Error::InvalidInput(format!("unknown hook event '{other}'"))),
        }
    }
}

/// Handler for one lifecycle event.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// The event this handler processes.
    fn event(&self) -> HookEvent;

    /// Handles a raw JSON payload and returns the JSON reply.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails or the reply cannot be encoded.
    async fn handle(&self, input: &str) -> Result<String>;
}

/// Parses a payload leniently; anything but a JSON object becomes `{}`.
#[must_use]
pub fn parse_input(input: &str) -> Value {
    match serde_json::from_str::<Value>(input) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            if !input.trim().is_empty() {
                tracing::debug!("Hook input is not a JSON object; treating as empty");
            }
            Value::Object(serde_json::Map::new())
        },
    }
}

/// Non-blank string field of a payload.
#[must_use]
pub fn str_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The empty reply.
#[must_use]
pub fn empty_response() -> String {
    "{}".to_string()
}

/// A reply injecting `context`, or `{}` when there is nothing to inject.
///
/// # Errors
///
/// Returns an error if the reply cannot be encoded.
pub fn context_response(event: HookEvent, context: &str) -> Result<String> {
    if context.trim().is_empty() {
        return Ok(empty_response());
    }
    let response = serde_json::json!({
        "hookSpecificOutput": {
            "hookEventName": event.event_name(),
            "additionalContext": context,
        }
    });
    serde_json::to_string(&response).map_err(|e| Error::OperationFailed {
        operation: "serialize_hook_response".to_string(),
        cause: e.to_string(),
    })
}

/// Renders memories as a markdown block for injection.
#[must_use]
pub fn format_memories(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return String::new();
    }

    let mut out = String::from("# Memory Context\n\n");
    for memory in memories {
        let relevance = memory.relevance_score.unwrap_or(0.0);
        let _ = writeln!(
            out,
            "- **{}** ({relevance:.2}): {}",
            memory.kind,
            memory.content.replace('\n', " ")
        );
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryDraft, MemoryId, MemoryKind};
    use chrono::Utc;

    #[test]
    fn test_event_round_trip_names() {
        for event in [HookEvent::UserPromptSubmit, HookEvent::TaskComplete, HookEvent::SessionEnd] {
            assert_eq!(event.as_str().parse::<HookEvent>().unwrap(), event);
        }
        assert_eq!("SessionEnd".parse::<HookEvent>().unwrap(), HookEvent::SessionEnd);
        assert!("pre-compact".parse::<HookEvent>().is_err());
    }

    #[test]
    fn test_parse_input_is_lenient() {
        assert_eq!(parse_input("not json"), serde_json::json!({}));
        assert_eq!(parse_input("[1, 2]"), serde_json::json!({}));
        let value = parse_input(r#"{"prompt": "  hi  ", "session_id": ""}"#);
        assert_eq!(str_field(&value, "prompt"), Some("hi"));
        assert_eq!(str_field(&value, "session_id"), None);
    }

    #[test]
    fn test_context_response_shape() {
        assert_eq!(context_response(HookEvent::UserPromptSubmit, "  ").unwrap(), "{}");

        let reply = context_response(HookEvent::UserPromptSubmit, "# Memory Context").unwrap();
        let value: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["hookSpecificOutput"]["hookEventName"], "UserPromptSubmit");
        assert_eq!(value["hookSpecificOutput"]["additionalContext"], "# Memory Context");
    }

    #[test]
    fn test_format_memories() {
        assert!(format_memories(&[]).is_empty());
        let memory = MemoryDraft::new(MemoryKind::Decision, "Use WAL\nmode")
            .into_memory(MemoryId::new("decision_1"), Utc::now(), 3)
            .with_relevance(0.8);
        let text = format_memories(&[memory]);
        assert!(text.starts_with("# Memory Context"));
        assert!(text.contains("- **decision** (0.80): Use WAL mode"));
    }
}
