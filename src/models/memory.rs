//! Memory types and identifiers.

use super::MemoryKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Open key-value map used for both `metadata` and `context`.
pub type Attributes = BTreeMap<String, Value>;

/// Context key that scopes a memory to a session.
pub const SESSION_ID_KEY: &str = "session_id";

/// Unique identifier for a memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a memory ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier for a memory of the given kind.
    ///
    /// UUID v7 keeps identifiers time-ordered and unique across processes.
    #[must_use]
    pub fn generate(kind: MemoryKind) -> Self {
        Self(format!("{}_{}", kind.as_str(), Uuid::now_v7().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A persisted memory.
///
/// Memories are immutable once written. Corrections are modelled as a new
/// memory plus deletion of the superseded one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier, never reused.
    pub id: MemoryId,
    /// Kind of memory, fixed at creation.
    pub kind: MemoryKind,
    /// Free-text payload.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Size of `content` in the configured token unit, computed at write time.
    pub token_count: usize,
    /// Kind-specific attributes (priority, category, ...).
    #[serde(default)]
    pub metadata: Attributes,
    /// Provenance (session, task, ...).
    #[serde(default)]
    pub context: Attributes,
    /// Relevance to the query that retrieved this memory.
    ///
    /// Only populated on retrieval results and never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl Memory {
    /// Returns the session this memory was captured in, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.context.get(SESSION_ID_KEY).and_then(Value::as_str)
    }

    /// Returns a copy annotated with a relevance score.
    #[must_use]
    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }
}

/// A memory candidate that has not been persisted yet.
///
/// Drafts have no id, timestamp or token count. Those are assigned by the
/// storage pipeline only after the draft passes review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDraft {
    /// Kind of memory.
    pub kind: MemoryKind,
    /// Content to review.
    pub content: String,
    /// Kind-specific attributes.
    #[serde(default)]
    pub metadata: Attributes,
    /// Provenance.
    #[serde(default)]
    pub context: Attributes,
}

impl MemoryDraft {
    /// Creates a draft with empty attribute maps.
    #[must_use]
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            metadata: Attributes::new(),
            context: Attributes::new(),
        }
    }

    /// Returns the session the draft belongs to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.context.get(SESSION_ID_KEY).and_then(Value::as_str)
    }

    /// Promotes the draft into a persisted memory.
    #[must_use]
    pub fn into_memory(self, id: MemoryId, created_at: DateTime<Utc>, token_count: usize) -> Memory {
        Memory {
            id,
            kind: self.kind,
            content: self.content,
            created_at,
            token_count,
            metadata: self.metadata,
            context: self.context,
            relevance_score: None,
        }
    }
}
