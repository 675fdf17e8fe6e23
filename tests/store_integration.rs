//! Storage pipeline tests against a file-backed SQLite store.
//!
//! Exercises the acceptance threshold, failure handling inside the panel,
//! the per-kind rejection memo, repeated stores and persistence failures.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use mnemos::filter::TrivialFilter;
use mnemos::models::{Memory, MemoryDraft, MemoryStats, SESSION_ID_KEY};
use mnemos::review::testing::{CallCounter, FailingScorer, FixedRelevanceScorer, FixedStorageScorer};
use mnemos::review::{ConsensusReviewer, RelevanceScorer, StorageScorer};
use mnemos::services::CONTENT_HASH_KEY;
use mnemos::{
    Error, MemoryId, MemoryKind, MemoryStore, ScoreVerdict, SearchFilter, SqliteMemoryStore,
    StoragePipeline, StoreRequest,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

const DECISION: &str = "Decided to keep retries at three with jittered backoff for the sync client";

fn relevance_panel() -> Vec<Arc<dyn RelevanceScorer>> {
    vec![
        Arc::new(FixedRelevanceScorer::new("direct", 0.5)),
        Arc::new(FixedRelevanceScorer::new("contextual", 0.5)),
    ]
}

fn fixed_panel(scores: [f64; 3], calls: &CallCounter) -> Vec<Arc<dyn StorageScorer>> {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            Arc::new(FixedStorageScorer::with_counter(
                format!("reviewer_{i}"),
                *score,
                calls.clone(),
            )) as Arc<dyn StorageScorer>
        })
        .collect()
}

fn pipeline(
    panel: Vec<Arc<dyn StorageScorer>>,
    store: Arc<dyn MemoryStore>,
) -> StoragePipeline {
    let reviewer = Arc::new(ConsensusReviewer::new(panel, relevance_panel()).unwrap());
    StoragePipeline::new(store, Arc::new(TrivialFilter::default()), reviewer)
}

fn file_store(dir: &TempDir) -> Arc<SqliteMemoryStore> {
    Arc::new(SqliteMemoryStore::new(dir.path().join("mnemos.db")).unwrap())
}

/// Reviewer that only values decisions.
struct DecisionsOnly {
    name: String,
    calls: CallCounter,
}

#[async_trait]
impl StorageScorer for DecisionsOnly {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_storage(&self, draft: &MemoryDraft) -> mnemos::Result<ScoreVerdict> {
        self.calls.hit();
        let score = if draft.kind == MemoryKind::Decision { 9.0 } else { 2.0 };
        Ok(ScoreVerdict::new(score, format!("kind {}", draft.kind)))
    }
}

/// Store whose writes always fail.
struct ReadOnlyStore;

impl MemoryStore for ReadOnlyStore {
    fn insert(&self, _memory: &Memory) -> mnemos::Result<()> {
        Err(Error::OperationFailed {
            operation: "insert_memory".to_string(),
            cause: "attempt to write a readonly database".to_string(),
        })
    }

    fn get(&self, _id: &MemoryId) -> mnemos::Result<Option<Memory>> {
        Ok(None)
    }

    fn search(
        &self,
        _query: &str,
        _filter: &SearchFilter,
        _limit: usize,
    ) -> mnemos::Result<Vec<Memory>> {
        Ok(Vec::new())
    }

    fn delete(&self, _id: &MemoryId) -> mnemos::Result<bool> {
        Ok(false)
    }

    fn delete_matching(&self, _filter: &SearchFilter) -> mnemos::Result<usize> {
        Ok(0)
    }

    fn stats(&self) -> mnemos::Result<MemoryStats> {
        Ok(MemoryStats::default())
    }
}

#[tokio::test]
async fn test_mean_at_threshold_is_accepted() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let pipeline = pipeline(fixed_panel([6.0, 6.0, 6.0], &calls), store.clone());

    let outcome = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert!((outcome.consensus_score - 6.0).abs() < 1e-9);
    assert_eq!(store.stats().unwrap().total, 1);
}

#[tokio::test]
async fn test_failed_reviewer_counts_as_zero() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let panel: Vec<Arc<dyn StorageScorer>> = vec![
        Arc::new(FixedStorageScorer::with_counter("a", 9.0, calls.clone())),
        Arc::new(FixedStorageScorer::with_counter("b", 9.0, calls.clone())),
        Arc::new(FailingScorer::new("c")),
    ];
    let pipeline = pipeline(panel, store.clone());

    let outcome = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();

    // (9 + 9 + 0) / 3 lands exactly on the threshold.
    assert!(outcome.accepted);
    assert!((outcome.consensus_score - 6.0).abs() < 1e-9);
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn test_raised_threshold_rejects() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let pipeline = pipeline(fixed_panel([7.0, 7.0, 7.0], &calls), store.clone()).with_threshold(8.0);

    let outcome = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();

    assert!(!outcome.accepted);
    assert!(outcome.memory_id.is_none());
    assert!(outcome.reason.contains("below threshold 8.00"));
    assert_eq!(store.stats().unwrap().total, 0);
}

#[tokio::test]
async fn test_rejected_content_is_filtered_on_repeat() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let pipeline = pipeline(fixed_panel([2.0, 3.0, 1.0], &calls), store);

    let first = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();
    assert!(!first.accepted);
    assert_eq!(calls.get(), 3);

    // Whitespace differences do not defeat the memo.
    let repeat = pipeline
        .store(StoreRequest::new(format!("  {DECISION}\n"), MemoryKind::Decision))
        .await
        .unwrap();
    assert!(!repeat.accepted);
    assert_eq!(repeat.reason, "trivial content filtered (recently_rejected)");
    assert!(repeat.consensus_score.abs() < f64::EPSILON);
    assert_eq!(calls.get(), 3);
}

#[tokio::test]
async fn test_attributes_are_persisted() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let pipeline = pipeline(fixed_panel([8.0, 8.0, 8.0], &calls), store.clone());

    let outcome = pipeline
        .store(
            StoreRequest::new(DECISION, MemoryKind::Working)
                .with_metadata("repo", "sync-client")
                .with_context("branch", "main")
                .with_session("session-42"),
        )
        .await
        .unwrap();

    let memory = store.get(outcome.memory_id.as_ref().unwrap()).unwrap().unwrap();
    assert_eq!(memory.kind, MemoryKind::Working);
    assert_eq!(memory.metadata["repo"], Value::from("sync-client"));
    assert!(memory.metadata.contains_key(CONTENT_HASH_KEY));
    assert_eq!(memory.context["branch"], Value::from("main"));
    assert_eq!(memory.context[SESSION_ID_KEY], Value::from("session-42"));
    assert_eq!(memory.session_id(), Some("session-42"));
    assert!(memory.relevance_score.is_none());
    assert!(memory.token_count > 0);
}

#[tokio::test]
async fn test_ids_are_never_reissued() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let pipeline = pipeline(fixed_panel([8.0, 8.0, 8.0], &calls), store.clone());

    let outcome = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();
    let id = outcome.memory_id.unwrap();
    let memory = store.get(&id).unwrap().unwrap();

    assert!(store.delete(&id).unwrap());
    let err = store.insert(&memory).unwrap_err();
    assert!(matches!(err, Error::OperationFailed { .. }));
    assert!(store.get(&id).unwrap().is_none());
}

#[tokio::test]
async fn test_persistence_failure_propagates() {
    let calls = CallCounter::new();
    let pipeline = pipeline(fixed_panel([9.0, 9.0, 9.0], &calls), Arc::new(ReadOnlyStore));

    let err = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OperationFailed { .. }));
    assert!(!err.is_collaborator_error());

    // A failed write is not a rejection: the same content is reviewed again.
    let _ = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await;
    assert_eq!(calls.get(), 6);
}

#[tokio::test]
async fn test_identical_content_is_stored_twice() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let pipeline = pipeline(fixed_panel([8.0, 8.0, 8.0], &calls), store.clone());

    let first = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();
    let second = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();

    assert!(first.accepted);
    assert!(second.accepted);
    assert_ne!(first.memory_id.unwrap(), second.memory_id.unwrap());
    assert_eq!(calls.get(), 6);
    assert_eq!(store.stats().unwrap().total, 2);
}

#[tokio::test]
async fn test_rejection_as_one_kind_does_not_block_another() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let calls = CallCounter::new();
    let panel: Vec<Arc<dyn StorageScorer>> = ["archivist", "skeptic", "practitioner"]
        .into_iter()
        .map(|name| {
            Arc::new(DecisionsOnly {
                name: name.to_string(),
                calls: calls.clone(),
            }) as Arc<dyn StorageScorer>
        })
        .collect();
    let pipeline = pipeline(panel, store.clone());

    let working = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Working))
        .await
        .unwrap();
    assert!(!working.accepted);
    assert!((working.consensus_score - 2.0).abs() < 1e-9);
    assert_eq!(calls.get(), 3);

    let decision = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Decision))
        .await
        .unwrap();
    assert!(decision.accepted);
    assert!((decision.consensus_score - 9.0).abs() < 1e-9);
    assert_eq!(calls.get(), 6);

    // The working rejection is still remembered for its own kind.
    let repeat = pipeline
        .store(StoreRequest::new(DECISION, MemoryKind::Working))
        .await
        .unwrap();
    assert_eq!(repeat.reason, "trivial content filtered (recently_rejected)");
    assert_eq!(calls.get(), 6);
    assert_eq!(store.stats().unwrap().count(MemoryKind::Decision), 1);
}
