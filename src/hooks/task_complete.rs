//! Task completion hook.

use super::{HookEvent, HookHandler, SOURCE_KEY, empty_response, parse_input, str_field};
use crate::Result;
use crate::models::{MemoryKind, StoreRequest};
use crate::services::Coordinator;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::instrument;

/// Records how a finished task was done as a `Procedural` memory.
///
/// Payload fields: `task` (what was asked), `summary` (how it was done),
/// optional `steps` (array of strings) and `session_id`.
pub struct TaskCompleteHandler {
    coordinator: Arc<Coordinator>,
}

impl TaskCompleteHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

fn procedure_text(input: &Value) -> Option<String> {
    let task = str_field(input, "task");
    let summary = str_field(input, "summary");
    let steps: Vec<&str> = input
        .get("steps")
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut text = match (task, summary) {
        (Some(task), Some(summary)) => format!("{task}: {summary}"),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (None, None) if steps.is_empty() => return None,
        (None, None) => String::new(),
    };
    for (i, step) in steps.iter().enumerate() {
        if !text.is_empty() {
            text.push('\n');
        }
        let _ = write!(text, "{}. {step}", i + 1);
    }
    Some(text)
}

#[async_trait]
impl HookHandler for TaskCompleteHandler {
    fn event(&self) -> HookEvent {
        HookEvent::TaskComplete
    }

    #[instrument(name = "mnemos.hook.task_complete", skip(self, input))]
    async fn handle(&self, input: &str) -> Result<String> {
        let input = parse_input(input);
        let Some(text) = procedure_text(&input) else {
            tracing::debug!("Nothing to record for completed task");
            return Ok(empty_response());
        };

        let mut request = StoreRequest::new(text, MemoryKind::Procedural)
            .with_context(SOURCE_KEY, "task_complete");
        if let Some(session) = str_field(&input, "session_id") {
            request = request.with_session(session);
        }
        drop(self.coordinator.spawn_store(request));

        Ok(empty_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::test_support::coordinator_scoring;
    use crate::models::SearchFilter;
    use std::time::Duration;

    #[test]
    fn test_procedure_text_variants() {
        let full = serde_json::json!({
            "task": "Rotate the signing key",
            "summary": "generated a new key and redeployed",
            "steps": ["run keygen", " ", "update the secret"]
        });
        assert_eq!(
            procedure_text(&full).unwrap(),
            "Rotate the signing key: generated a new key and redeployed\n1. run keygen\n2. update the secret"
        );

        let steps_only = serde_json::json!({"steps": ["a", "b"]});
        assert_eq!(procedure_text(&steps_only).unwrap(), "1. a\n2. b");

        assert!(procedure_text(&serde_json::json!({"task": "  "})).is_none());
    }

    #[tokio::test]
    async fn test_task_is_stored_as_procedure() {
        let (coordinator, _store) = coordinator_scoring(7.0);
        let handler = TaskCompleteHandler::new(Arc::clone(&coordinator));

        let reply = handler
            .handle(r#"{"session_id": "s1", "task": "Fix flaky CI", "summary": "pinned the toolchain and cached the registry"}"#)
            .await
            .unwrap();
        assert_eq!(reply, "{}");
        assert!(coordinator.drain_background(Duration::from_secs(5)).await);

        let stored = coordinator
            .list(&SearchFilter::new().with_kind(MemoryKind::Procedural), 10)
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].session_id(), Some("s1"));
        assert!(stored[0].content.starts_with("Fix flaky CI:"));
    }
}
