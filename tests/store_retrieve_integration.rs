//! End-to-end store and retrieve tests against a file-backed store.
//!
//! Covers acceptance by consensus, trivial filtering, token-budgeted
//! retrieval, session clearing and persistence across reopen.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration, Utc};
use std::sync::Arc;
use mnemos::filter::TrivialFilter;
use mnemos::models::{MemoryDraft, SearchFilter};
use mnemos::review::testing::{CallCounter, FixedRelevanceScorer, FixedStorageScorer};
use mnemos::review::{ConsensusReviewer, RelevanceScorer, StorageScorer};
use mnemos::services::CONTENT_HASH_KEY;
use mnemos::{
    Coordinator, MemoryId, MemoryKind, MemoryStore, RetrieveRequest, SqliteMemoryStore,
    StoreRequest,
};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    coordinator: Coordinator,
    store: Arc<SqliteMemoryStore>,
    storage_calls: CallCounter,
    _dir: TempDir,
}

fn harness(storage_scores: [f64; 3], relevance: f64) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteMemoryStore::new(dir.path().join("mnemos.db")).unwrap());
    let storage_calls = CallCounter::new();

    let storage: Vec<Arc<dyn StorageScorer>> = storage_scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            Arc::new(FixedStorageScorer::with_counter(
                format!("storage_{i}"),
                *score,
                storage_calls.clone(),
            )) as Arc<dyn StorageScorer>
        })
        .collect();
    let relevance: Vec<Arc<dyn RelevanceScorer>> = vec![
        Arc::new(FixedRelevanceScorer::new("direct", relevance)),
        Arc::new(FixedRelevanceScorer::new("contextual", relevance)),
    ];

    let reviewer = Arc::new(ConsensusReviewer::new(storage, relevance).unwrap());
    let coordinator = Coordinator::new(store.clone(), Arc::new(TrivialFilter::default()), reviewer);

    Harness {
        coordinator,
        store,
        storage_calls,
        _dir: dir,
    }
}

fn seed(store: &SqliteMemoryStore, id: &str, kind: MemoryKind, content: &str, tokens: usize) {
    let memory = MemoryDraft::new(kind, content).into_memory(MemoryId::new(id), Utc::now(), tokens);
    store.insert(&memory).unwrap();
}

// ============================================================================
// Storage
// ============================================================================

#[tokio::test]
async fn test_unanimous_panel_stores_memory() {
    let h = harness([8.0, 7.0, 9.0], 0.5);

    let outcome = h
        .coordinator
        .store(StoreRequest::new(
            "Decided to use a relational store for session state",
            MemoryKind::Decision,
        ))
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert!((outcome.consensus_score - 8.0).abs() < 1e-9);
    assert_eq!(h.storage_calls.get(), 3);

    let id = outcome.memory_id.unwrap();
    assert!(id.as_str().starts_with("decision_"));
    let stored = h.coordinator.get(&id).unwrap().unwrap();
    assert_eq!(stored.kind, MemoryKind::Decision);
    assert_eq!(stored.content, "Decided to use a relational store for session state");
    assert!(stored.token_count > 0);
    assert!(stored.metadata.contains_key(CONTENT_HASH_KEY));
}

#[tokio::test]
async fn test_trivial_content_never_reaches_panel() {
    let h = harness([8.0, 8.0, 8.0], 0.5);

    let outcome = h
        .coordinator
        .store(StoreRequest::new("ok", MemoryKind::Working))
        .await
        .unwrap();

    assert!(!outcome.accepted);
    assert!(outcome.memory_id.is_none());
    assert!(outcome.consensus_score.abs() < f64::EPSILON);
    assert!(outcome.reason.contains("trivial"));
    assert_eq!(h.storage_calls.get(), 0);
    assert_eq!(h.coordinator.stats().unwrap().total, 0);
}

#[tokio::test]
async fn test_low_consensus_is_rejected_with_summary() {
    let h = harness([3.0, 4.0, 5.0], 0.5);

    let outcome = h
        .coordinator
        .store(StoreRequest::new(
            "Maybe the build was slow today, not sure why",
            MemoryKind::Semantic,
        ))
        .await
        .unwrap();

    assert!(!outcome.accepted);
    assert!((outcome.consensus_score - 4.0).abs() < 1e-9);
    assert!(outcome.reason.contains("storage_0=3.0"));
    assert_eq!(h.coordinator.stats().unwrap().total, 0);
}

// ============================================================================
// Retrieval
// ============================================================================

#[tokio::test]
async fn test_token_budget_caps_result() {
    let h = harness([8.0, 8.0, 8.0], 0.6);
    for i in 0..20 {
        seed(
            &h.store,
            &format!("semantic_{i:02}"),
            MemoryKind::Semantic,
            &format!("Cache invalidation note number {i} for the edge tier"),
            150,
        );
    }

    let memories = h
        .coordinator
        .retrieve(&RetrieveRequest::new("cache").with_limit(5).with_max_tokens(500))
        .await
        .unwrap();

    assert!(memories.len() <= 3);
    assert_eq!(memories.len(), 3);
    assert!(memories.iter().map(|m| m.token_count).sum::<usize>() <= 500);
    assert!(memories.iter().all(|m| m.relevance_score.is_some()));
}

#[tokio::test]
async fn test_kind_filter_and_dedup() {
    let h = harness([8.0, 8.0, 8.0], 0.7);
    seed(&h.store, "decision_a", MemoryKind::Decision, "Use rustls for every outbound TLS connection", 9);
    seed(&h.store, "decision_b", MemoryKind::Decision, "use rustls for every outbound TLS connection!", 9);
    seed(&h.store, "semantic_a", MemoryKind::Semantic, "TLS handshakes dominate cold start latency", 7);

    let all = h
        .coordinator
        .retrieve(&RetrieveRequest::new("TLS").with_kind(MemoryKind::Decision))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let deduped = h
        .coordinator
        .retrieve(
            &RetrieveRequest::new("TLS")
                .with_kind(MemoryKind::Decision)
                .deduplicated(0.85),
        )
        .await
        .unwrap();
    assert_eq!(deduped.len(), 1);
}

#[tokio::test]
async fn test_empty_store_returns_nothing() {
    let h = harness([8.0, 8.0, 8.0], 0.7);
    let memories = h
        .coordinator
        .retrieve(&RetrieveRequest::new("anything"))
        .await
        .unwrap();
    assert!(memories.is_empty());
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test]
async fn test_clear_scoped_empties_session_working_memory() {
    let h = harness([8.0, 8.0, 8.0], 0.5);
    for (content, session) in [
        ("Investigating the flaky login test on CI", "s1"),
        ("Login test flakes only when the cache is cold", "s1"),
        ("Reviewing the payments refactor branch", "s2"),
    ] {
        let outcome = h
            .coordinator
            .store(StoreRequest::new(content, MemoryKind::Working).with_session(session))
            .await
            .unwrap();
        assert!(outcome.accepted);
    }

    let cleared = h.coordinator.clear_scoped("s1").unwrap();
    assert_eq!(cleared, 2);

    let s1 = h
        .coordinator
        .list(&SearchFilter::new().with_kind(MemoryKind::Working).with_session("s1"), 10)
        .unwrap();
    assert!(s1.is_empty());
    assert_eq!(h.coordinator.stats().unwrap().count(MemoryKind::Working), 1);

    let listed = h
        .coordinator
        .retrieve(
            &RetrieveRequest::new("")
                .with_kind(MemoryKind::Working)
                .with_session("s1"),
        )
        .await
        .unwrap();
    assert!(listed.is_empty());

    let searched = h
        .coordinator
        .retrieve(
            &RetrieveRequest::new("login test")
                .with_kind(MemoryKind::Working)
                .with_session("s1"),
        )
        .await
        .unwrap();
    assert!(searched.is_empty());

    let other = h
        .coordinator
        .retrieve(
            &RetrieveRequest::new("payments refactor")
                .with_kind(MemoryKind::Working)
                .with_session("s2"),
        )
        .await
        .unwrap();
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].content, "Reviewing the payments refactor branch");
}

#[tokio::test]
async fn test_prune_removes_only_old_memories_of_kind() {
    let h = harness([8.0, 8.0, 8.0], 0.5);
    let old = Utc::now() - Duration::days(90);
    let memory = MemoryDraft::new(MemoryKind::Prospective, "Remind me to renew the certificate")
        .into_memory(MemoryId::new("prospective_old"), old, 8);
    h.store.insert(&memory).unwrap();
    seed(&h.store, "prospective_new", MemoryKind::Prospective, "Remind me to rotate keys", 6);

    let pruned = h
        .coordinator
        .prune(MemoryKind::Prospective, Utc::now() - Duration::days(30))
        .unwrap();
    assert_eq!(pruned, 1);
    assert!(h.coordinator.get(&MemoryId::new("prospective_new")).unwrap().is_some());
}

#[tokio::test]
async fn test_memories_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mnemos.db");
    {
        let store = SqliteMemoryStore::new(&path).unwrap();
        seed(&store, "decision_keep", MemoryKind::Decision, "Keep the audit log for seven years", 8);
    }

    let reopened = SqliteMemoryStore::new(&path).unwrap();
    let memory = reopened.get(&MemoryId::new("decision_keep")).unwrap().unwrap();
    assert_eq!(memory.content, "Keep the audit log for seven years");
    assert_eq!(reopened.stats().unwrap().total, 1);
}
