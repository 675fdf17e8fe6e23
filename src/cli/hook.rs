//! Hook dispatch for the `hook` command.

use crate::config::MnemosConfig;
use crate::hooks::{
    HookEvent, HookHandler, SessionEndHandler, TaskCompleteHandler, UserPromptHandler,
    empty_response,
};
use crate::services::Coordinator;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a hook process waits for background stores before exiting.
pub const HOOK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the handler for `event`.
#[must_use]
pub fn hook_handler(
    event: HookEvent,
    coordinator: Arc<Coordinator>,
    config: &MnemosConfig,
) -> Box<dyn HookHandler> {
    match event {
        HookEvent::UserPromptSubmit => Box::new(
            UserPromptHandler::new(coordinator)
                .with_similarity_threshold(config.retrieval.similarity_threshold),
        ),
        HookEvent::TaskComplete => Box::new(TaskCompleteHandler::new(coordinator)),
        HookEvent::SessionEnd => Box::new(SessionEndHandler::new(coordinator)),
    }
}

/// Runs a handler and waits for the stores it dispatched.
///
/// Handler errors are logged and answered with `{}` so the host session is
/// never interrupted.
pub async fn run_hook(
    handler: &dyn HookHandler,
    coordinator: &Coordinator,
    input: &str,
    drain_timeout: Duration,
) -> String {
    let hook = handler.event().as_str();
    let start = Instant::now();

    let (reply, status) = match handler.handle(input).await {
        Ok(reply) => (reply, "success"),
        Err(e) => {
            tracing::warn!(hook, error = %e, "Hook failed");
            (empty_response(), "error")
        },
    };

    if !coordinator.drain_background(drain_timeout).await {
        metrics::counter!("hook_drain_timeouts_total", "hook" => hook).increment(1);
    }

    metrics::counter!("hook_invocations_total", "hook" => hook, "status" => status).increment(1);
    metrics::histogram!("hook_duration_ms", "hook" => hook)
        .record(start.elapsed().as_secs_f64() * 1000.0);

    reply
}
