//! User prompt submit hook.

use super::{
    HookEvent, HookHandler, SOURCE_KEY, context_response, detect_intentions, empty_response,
    format_memories, parse_input, str_field,
};
use crate::Result;
use crate::models::{DEFAULT_SIMILARITY_THRESHOLD, MemoryKind, RetrieveRequest, StoreRequest};
use crate::services::Coordinator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Memories injected per prompt.
pub const DEFAULT_PROMPT_LIMIT: usize = 5;

/// Token budget for injected context.
pub const DEFAULT_PROMPT_MAX_TOKENS: usize = 2000;

/// Records the prompt and injects relevant durable memories.
///
/// The prompt itself becomes a `Working` memory of the session, and any
/// stated intention ("remind me to ...") a `Prospective` one. Both are
/// stored in the background so the reply is not held up by review.
pub struct UserPromptHandler {
    coordinator: Arc<Coordinator>,
    limit: usize,
    max_tokens: usize,
    similarity_threshold: f64,
}

impl UserPromptHandler {
    /// Creates a handler with default limits.
    #[must_use]
    pub const fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            limit: DEFAULT_PROMPT_LIMIT,
            max_tokens: DEFAULT_PROMPT_MAX_TOKENS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Sets how many memories are injected.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the token budget for injected memories.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the dedup threshold.
    #[must_use]
    pub const fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    fn dispatch(&self, request: StoreRequest) {
        drop(self.coordinator.spawn_store(request.with_context(SOURCE_KEY, "user_prompt")));
    }

    fn context_request(&self, prompt: &str) -> RetrieveRequest {
        MemoryKind::all()
            .iter()
            .filter(|kind| !kind.is_session_scoped())
            .fold(RetrieveRequest::new(prompt), |request, kind| request.with_kind(*kind))
            .with_limit(self.limit)
            .with_max_tokens(self.max_tokens)
            .deduplicated(self.similarity_threshold)
    }
}

#[async_trait]
impl HookHandler for UserPromptHandler {
    fn event(&self) -> HookEvent {
        HookEvent::UserPromptSubmit
    }

    #[instrument(name = "mnemos.hook.user_prompt_submit", skip(self, input))]
    async fn handle(&self, input: &str) -> Result<String> {
        let input = parse_input(input);
        let Some(prompt) = str_field(&input, "prompt") else {
            tracing::debug!("No prompt in payload");
            return Ok(empty_response());
        };
        let session = str_field(&input, "session_id");

        if let Some(session) = session {
            self.dispatch(StoreRequest::new(prompt, MemoryKind::Working).with_session(session));
        }

        let intentions = detect_intentions(prompt);
        for intention in &intentions {
            let request = StoreRequest::new(intention.as_str(), MemoryKind::Prospective);
            self.dispatch(match session {
                Some(session) => request.with_session(session),
                None => request,
            });
        }

        let memories = self.coordinator.retrieve(&self.context_request(prompt)).await?;
        tracing::info!(
            intentions = intentions.len(),
            injected = memories.len(),
            "Handled user prompt"
        );

        context_response(HookEvent::UserPromptSubmit, &format_memories(&memories))
    }
}
