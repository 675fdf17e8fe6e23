//! Session end hook.
//!
//! Promotes what the session learned into durable memory, then clears the
//! session's working memory.

use super::{
    HookEvent, HookHandler, SOURCE_KEY, empty_response, extract_candidates, parse_input,
    str_field,
};
use crate::Result;
use crate::models::{MemoryKind, SearchFilter, StoreRequest};
use crate::services::Coordinator;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Most candidates promoted per session.
pub const DEFAULT_MAX_PROMOTIONS: usize = 20;

/// Most working memories scanned per session.
pub const DEFAULT_WORKING_SCAN_LIMIT: usize = 500;

/// How long to wait for in-process background stores before scanning.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Reviews the transcript and working memory at session end.
///
/// Decision sentences become `Decision` memories and learning sentences
/// `Semantic` ones. Each goes through the normal storage pipeline and is
/// awaited. Working memory is cleared only if every promotion reached the
/// store without a persistence error.
pub struct SessionEndHandler {
    coordinator: Arc<Coordinator>,
    max_promotions: usize,
    scan_limit: usize,
    drain_timeout: Duration,
}

impl SessionEndHandler {
    /// Creates a handler with default limits.
    #[must_use]
    pub const fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            max_promotions: DEFAULT_MAX_PROMOTIONS,
            scan_limit: DEFAULT_WORKING_SCAN_LIMIT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Caps the number of promoted candidates.
    #[must_use]
    pub const fn with_max_promotions(mut self, max_promotions: usize) -> Self {
        self.max_promotions = max_promotions;
        self
    }

    /// Sets the wait for pending background stores.
    #[must_use]
    pub const fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// Transcript text: a string, or an array of strings or `{"content": ..}` turns.
fn transcript_texts(input: &Value) -> Vec<String> {
    match input.get("transcript") {
        Some(Value::String(text)) => vec![text.clone()],
        Some(Value::Array(turns)) => turns
            .iter()
            .filter_map(|turn| match turn {
                Value::String(text) => Some(text.clone()),
                Value::Object(_) => turn.get("content").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl HookHandler for SessionEndHandler {
    fn event(&self) -> HookEvent {
        HookEvent::SessionEnd
    }

    #[instrument(name = "mnemos.hook.session_end", skip(self, input))]
    async fn handle(&self, input: &str) -> Result<String> {
        let input = parse_input(input);
        let Some(session) = str_field(&input, "session_id") else {
            tracing::debug!("No session id in payload");
            return Ok(empty_response());
        };

        self.coordinator.drain_background(self.drain_timeout).await;

        let transcript = transcript_texts(&input);
        let working = self.coordinator.list(
            &SearchFilter::new()
                .with_kind(MemoryKind::Working)
                .with_session(session),
            self.scan_limit,
        )?;

        let candidates = extract_candidates(
            transcript
                .iter()
                .map(String::as_str)
                .chain(working.iter().map(|memory| memory.content.as_str())),
        );
        let considered = candidates.len().min(self.max_promotions);

        let outcomes = join_all(candidates.into_iter().take(self.max_promotions).map(
            |(kind, content)| {
                self.coordinator.store(
                    StoreRequest::new(content, kind)
                        .with_session(session)
                        .with_context(SOURCE_KEY, "session_end"),
                )
            },
        ))
        .await;

        let mut promoted = 0usize;
        for outcome in outcomes {
            if outcome?.accepted {
                promoted += 1;
            }
        }

        let cleared = self.coordinator.clear_scoped(session)?;
        tracing::info!(considered, promoted, cleared, "Session ended");

        Ok(empty_response())
    }
}
