//! Timeout and circuit breaking at the collaborator boundary.

use super::{RelevanceScorer, ScoreVerdict, StorageScorer};
use crate::models::{Memory, MemoryDraft};
use crate::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Resilience settings for one scoring collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorerResilienceConfig {
    /// Per-call deadline.
    pub timeout: Duration,
    /// Consecutive failures before the circuit opens.
    pub breaker_failure_threshold: u32,
    /// How long the circuit stays open before a trial call.
    pub breaker_reset: Duration,
    /// Trial calls allowed while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for ScorerResilienceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            breaker_failure_threshold: 3,
            breaker_reset: Duration::from_secs(30),
            breaker_half_open_max_calls: 1,
        }
    }
}

#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

#[derive(Debug)]
struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
}

impl CircuitBreaker {
    fn new(config: &ScorerResilienceConfig) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: config.breaker_reset,
            half_open_max_calls: config.breaker_half_open_max_calls.max(1),
        }
    }

    fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    const fn on_success(&mut self) {
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Returns true when this failure opened the circuit.
    fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// Wraps a scorer with a deadline and a circuit breaker.
///
/// A call that exceeds the deadline yields [`Error::Timeout`]; while the
/// circuit is open calls fail immediately with [`Error::ScorerFailed`]. The
/// reviewer turns both into the panel minimum.
pub struct ResilientScorer<S: ?Sized> {
    inner: Arc<S>,
    config: ScorerResilienceConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl<S: ?Sized> ResilientScorer<S> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<S>, config: ScorerResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new(&config);
        Self {
            inner,
            config,
            breaker: Mutex::new(breaker),
        }
    }

    /// Returns true while calls are being short-circuited.
    #[must_use]
    pub fn is_open(&self) -> bool {
        let breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(breaker.state, BreakerState::Open { .. })
    }

    async fn guarded<F>(&self, scorer: &str, operation: &'static str, call: F) -> Result<ScoreVerdict>
    where
        F: Future<Output = Result<ScoreVerdict>> + Send,
    {
        let allowed = {
            let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
            let allowed = breaker.allow();
            record_breaker_state(scorer, breaker.state_value());
            allowed
        };
        if !allowed {
            record_request(scorer, operation, "circuit_open", Duration::ZERO);
            return Err(Error::ScorerFailed {
                scorer: scorer.to_string(),
                cause: "circuit breaker open".to_string(),
            });
        }

        let start = Instant::now();
        let result = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                scorer: scorer.to_string(),
                timeout_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        let elapsed = start.elapsed();

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(_) => {
                breaker.on_success();
                record_request(scorer, operation, "success", elapsed);
            },
            Err(e) => {
                let status = if matches!(e, Error::Timeout { .. }) {
                    "timeout"
                } else {
                    "error"
                };
                record_request(scorer, operation, status, elapsed);
                if breaker.on_failure() {
                    metrics::counter!("scorer_circuit_breaker_trips_total", "scorer" => scorer.to_string())
                        .increment(1);
                    tracing::warn!(scorer, "Scorer circuit breaker opened");
                }
            },
        }
        record_breaker_state(scorer, breaker.state_value());
        drop(breaker);

        result
    }
}

fn record_request(scorer: &str, operation: &'static str, status: &'static str, elapsed: Duration) {
    metrics::counter!(
        "scorer_requests_total",
        "scorer" => scorer.to_string(),
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "scorer_request_duration_ms",
        "scorer" => scorer.to_string(),
        "operation" => operation,
        "status" => status
    )
    .record(elapsed.as_secs_f64() * 1000.0);
}

fn record_breaker_state(scorer: &str, state: u8) {
    metrics::gauge!("scorer_circuit_breaker_state", "scorer" => scorer.to_string())
        .set(f64::from(state));
}

#[async_trait]
impl<S: StorageScorer + ?Sized> StorageScorer for ResilientScorer<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn score_storage(&self, draft: &MemoryDraft) -> Result<ScoreVerdict> {
        self.guarded(self.inner.name(), "storage", self.inner.score_storage(draft))
            .await
    }
}

#[async_trait]
impl<S: RelevanceScorer + ?Sized> RelevanceScorer for ResilientScorer<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn score_relevance(&self, memory: &Memory, query: &str) -> Result<ScoreVerdict> {
        self.guarded(
            self.inner.name(),
            "relevance",
            self.inner.score_relevance(memory, query),
        )
        .await
    }
}
