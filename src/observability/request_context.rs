//! Request context propagation for correlation IDs.
//!
//! Each CLI command, hook invocation and background store runs inside one
//! context. The id is attached to log lines through the `request` span that
//! [`scope_request_context`] opens.

use std::cell::RefCell;
use std::future::Future;
use tracing::Instrument;
use uuid::Uuid;

/// Correlation id plus where the work came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
    origin: &'static str,
}

impl RequestContext {
    /// Creates a context with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(Uuid::new_v4().to_string())
    }

    /// Creates a context with an existing id.
    #[must_use]
    pub fn from_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            origin: "unknown",
        }
    }

    /// Tags the context with its entry point, e.g. `cli:store`.
    #[must_use]
    pub const fn with_origin(mut self, origin: &'static str) -> Self {
        self.origin = origin;
        self
    }

    /// The correlation id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The entry point.
    #[must_use]
    pub const fn origin(&self) -> &'static str {
        self.origin
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

tokio::task_local! {
    static TASK_CONTEXT: RequestContext;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Restores the previous thread-local context on drop.
pub struct RequestContextGuard {
    previous: Option<RequestContext>,
}

impl Drop for RequestContextGuard {
    fn drop(&mut self) {
        THREAD_CONTEXT.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

/// Enters a context for synchronous code.
#[must_use]
pub fn enter_request_context(context: RequestContext) -> RequestContextGuard {
    let previous = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(context));
    RequestContextGuard { previous }
}

/// Runs `fut` inside `context`, across every await point, under a `request`
/// span carrying the id and origin.
pub async fn scope_request_context<F, T>(context: RequestContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    let span = tracing::info_span!(
        "request",
        request_id = %context.request_id,
        origin = context.origin
    );
    TASK_CONTEXT
        .scope(context.clone(), async move {
            let _guard = enter_request_context(context);
            fut.await
        })
        .instrument(span)
        .await
}

/// The active context, task-local first.
#[must_use]
pub fn current_request_context() -> Option<RequestContext> {
    if let Ok(context) = TASK_CONTEXT.try_with(Clone::clone) {
        return Some(context);
    }
    THREAD_CONTEXT.with(|slot| slot.borrow().clone())
}

/// The active request id.
#[must_use]
pub fn current_request_id() -> Option<String> {
    current_request_context().map(|context| context.request_id)
}
