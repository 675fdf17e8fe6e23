//! Store and retrieve request types.

use super::memory::{Attributes, SESSION_ID_KEY};
use super::{MemoryDraft, MemoryKind};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Default number of memories returned by a retrieval.
pub const DEFAULT_RETRIEVE_LIMIT: usize = 10;

/// Default similarity above which retrieval dedup drops a memory.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Filter applied to candidate search in the memory store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Restrict to these kinds (empty means all kinds).
    pub kinds: Vec<MemoryKind>,
    /// Only memories created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only memories created strictly before this instant.
    pub before: Option<DateTime<Utc>>,
    /// Only memories whose `context.session_id` matches.
    pub session_id: Option<String>,
}

impl SearchFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a kind to the filter.
    #[must_use]
    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Sets the creation-time lower bound.
    #[must_use]
    pub const fn created_after(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets the creation-time upper bound (exclusive).
    #[must_use]
    pub const fn created_before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// Scopes the filter to a session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Returns true if the filter has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
            && self.since.is_none()
            && self.before.is_none()
            && self.session_id.is_none()
    }
}

/// Request to store a memory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    /// Raw content.
    pub content: String,
    /// Declared kind.
    pub kind: MemoryKind,
    /// Kind-specific attributes.
    pub metadata: Attributes,
    /// Provenance.
    pub context: Attributes,
}

impl StoreRequest {
    /// Creates a request with empty attribute maps.
    #[must_use]
    pub fn new(content: impl Into<String>, kind: MemoryKind) -> Self {
        Self {
            content: content.into(),
            kind,
            metadata: Attributes::new(),
            context: Attributes::new(),
        }
    }

    /// Adds a metadata attribute.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Adds a context attribute.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Records the session the memory came from.
    #[must_use]
    pub fn with_session(self, session_id: impl Into<String>) -> Self {
        self.with_context(SESSION_ID_KEY, session_id.into())
    }

    /// Builds the pre-review draft.
    ///
    /// Content is trimmed and attribute maps are carried over unchanged.
    #[must_use]
    pub fn into_draft(self) -> MemoryDraft {
        MemoryDraft {
            kind: self.kind,
            content: self.content.trim().to_string(),
            metadata: self.metadata,
            context: self.context,
        }
    }
}

/// Request to retrieve memories.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveRequest {
    /// Text query; empty lists the newest memories.
    pub query: String,
    /// Restrict to these kinds.
    pub kinds: Vec<MemoryKind>,
    /// Maximum number of memories returned.
    pub limit: usize,
    /// Upper bound on the summed `token_count` of the result.
    pub max_tokens: Option<usize>,
    /// Creation-time lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to memories captured in this session.
    pub session_id: Option<String>,
    /// Whether to drop near-duplicates.
    pub deduplicate: bool,
    /// Similarity above which a later memory counts as a duplicate.
    pub similarity_threshold: f64,
}

impl Default for RetrieveRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            kinds: Vec::new(),
            limit: DEFAULT_RETRIEVE_LIMIT,
            max_tokens: None,
            since: None,
            session_id: None,
            deduplicate: false,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl RetrieveRequest {
    /// Creates a request for the given query with default options.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Adds a kind filter.
    #[must_use]
    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Sets the result limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the token budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the creation-time lower bound.
    #[must_use]
    pub const fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Scopes the retrieval to a session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Enables deduplication at the given threshold.
    #[must_use]
    pub const fn deduplicated(mut self, similarity_threshold: f64) -> Self {
        self.deduplicate = true;
        self.similarity_threshold = similarity_threshold;
        self
    }

    /// Builds the store-level filter for candidate search.
    #[must_use]
    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            kinds: self.kinds.clone(),
            since: self.since,
            before: None,
            session_id: self.session_id.clone(),
        }
    }
}
