//! Scorer doubles for tests and local experiments.
//!
//! Every double counts how often it was called so tests can assert that a
//! code path never reached the panel.

use super::{RelevanceScorer, ScoreVerdict, StorageScorer};
use crate::models::{Memory, MemoryDraft};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call, for scorers defined outside this module.
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Storage scorer that always returns the same score.
#[derive(Debug)]
pub struct FixedStorageScorer {
    name: String,
    score: f64,
    calls: CallCounter,
}

impl FixedStorageScorer {
    /// Creates a scorer with its own counter.
    #[must_use]
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self::with_counter(name, score, CallCounter::new())
    }

    /// Creates a scorer that records calls into a shared counter.
    #[must_use]
    pub fn with_counter(name: impl Into<String>, score: f64, calls: CallCounter) -> Self {
        Self {
            name: name.into(),
            score,
            calls,
        }
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait]
impl StorageScorer for FixedStorageScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_storage(&self, _draft: &MemoryDraft) -> Result<ScoreVerdict> {
        self.calls.hit();
        Ok(ScoreVerdict::new(self.score, format!("fixed {}", self.score)))
    }
}

type RelevanceFn = dyn Fn(&Memory, &str) -> f64 + Send + Sync;

/// Relevance scorer driven by a closure.
pub struct FixedRelevanceScorer {
    name: String,
    score: Box<RelevanceFn>,
    calls: CallCounter,
}

impl FixedRelevanceScorer {
    /// Creates a scorer that returns the same score for every memory.
    #[must_use]
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self::from_fn(name, move |_, _| score)
    }

    /// Creates a scorer that computes the score from the memory and query.
    #[must_use]
    pub fn from_fn(
        name: impl Into<String>,
        score: impl Fn(&Memory, &str) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            score: Box::new(score),
            calls: CallCounter::new(),
        }
    }

    /// Records calls into a shared counter instead.
    #[must_use]
    pub fn counting(mut self, calls: CallCounter) -> Self {
        self.calls = calls;
        self
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait]
impl RelevanceScorer for FixedRelevanceScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_relevance(&self, memory: &Memory, query: &str) -> Result<ScoreVerdict> {
        self.calls.hit();
        let score = (self.score)(memory, query);
        Ok(ScoreVerdict::new(score, "scripted"))
    }
}

/// Scorer that always errors, on either panel.
#[derive(Debug)]
pub struct FailingScorer {
    name: String,
    calls: CallCounter,
}

impl FailingScorer {
    /// Creates a failing scorer.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: CallCounter::new(),
        }
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn fail(&self) -> Error {
        self.calls.hit();
        Error::ScorerFailed {
            scorer: self.name.clone(),
            cause: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl StorageScorer for FailingScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_storage(&self, _draft: &MemoryDraft) -> Result<ScoreVerdict> {
        Err(self.fail())
    }
}

#[async_trait]
impl RelevanceScorer for FailingScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_relevance(&self, _memory: &Memory, _query: &str) -> Result<ScoreVerdict> {
        Err(self.fail())
    }
}

/// Scorer that sleeps before answering, on either panel.
#[derive(Debug)]
pub struct StallingScorer {
    name: String,
    score: f64,
    delay: Duration,
    calls: CallCounter,
}

impl StallingScorer {
    /// Creates a scorer that answers `score` after `delay`.
    #[must_use]
    pub fn new(name: impl Into<String>, score: f64, delay: Duration) -> Self {
        Self {
            name: name.into(),
            score,
            delay,
            calls: CallCounter::new(),
        }
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    async fn answer(&self) -> ScoreVerdict {
        self.calls.hit();
        tokio::time::sleep(self.delay).await;
        ScoreVerdict::new(self.score, format!("after {}ms", self.delay.as_millis()))
    }
}

#[async_trait]
impl StorageScorer for StallingScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_storage(&self, _draft: &MemoryDraft) -> Result<ScoreVerdict> {
        Ok(self.answer().await)
    }
}

#[async_trait]
impl RelevanceScorer for StallingScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_relevance(&self, _memory: &Memory, _query: &str) -> Result<ScoreVerdict> {
        Ok(self.answer().await)
    }
}
