//! Coordinator.
//!
//! The single entry point callers use. Owns the two pipelines and the store
//! they share, and adds the maintenance operations that bypass review.

use crate::filter::TrivialFilter;
use crate::models::{
    Memory, MemoryId, MemoryKind, MemoryStats, RetrieveRequest, SearchFilter, StoreOutcome,
    StoreRequest,
};
use crate::observability::{RequestContext, current_request_context, scope_request_context};
use crate::review::ConsensusReviewer;
use crate::services::{RetrievalPipeline, StoragePipeline};
use crate::storage::MemoryStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Tracks background store tasks so a short-lived process can wait for them.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when the task ends, however it ends.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(in_flight: Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Memory store front door.
pub struct Coordinator {
    store: Arc<dyn MemoryStore>,
    storage: Arc<StoragePipeline>,
    retrieval: RetrievalPipeline,
    in_flight: Arc<InFlight>,
}

impl Coordinator {
    /// Wires both pipelines with default settings over one store.
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        filter: Arc<TrivialFilter>,
        reviewer: Arc<ConsensusReviewer>,
    ) -> Self {
        let storage = StoragePipeline::new(Arc::clone(&store), filter, Arc::clone(&reviewer));
        let retrieval = RetrievalPipeline::new(Arc::clone(&store), reviewer);
        Self::from_parts(store, storage, retrieval)
    }

    /// Assembles a coordinator from configured pipelines.
    ///
    /// Both pipelines are expected to share `store`.
    #[must_use]
    pub fn from_parts(
        store: Arc<dyn MemoryStore>,
        storage: StoragePipeline,
        retrieval: RetrievalPipeline,
    ) -> Self {
        Self {
            store,
            storage: Arc::new(storage),
            retrieval,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Filters, reviews and, if accepted, persists an observation.
    ///
    /// # Errors
    ///
    /// Returns an error only if persistence fails.
    pub async fn store(&self, request: StoreRequest) -> Result<StoreOutcome> {
        self.storage.store(request).await
    }

    /// Runs [`Self::store`] on the runtime without blocking the caller.
    ///
    /// The task inherits the caller's request context. Failures are logged
    /// and counted; nothing is reported back.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn_store(&self, request: StoreRequest) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let guard = InFlightGuard::new(Arc::clone(&self.in_flight));
        let context = current_request_context()
            .unwrap_or_else(|| RequestContext::new().with_origin("background_store"));
        let kind = request.kind;

        tokio::spawn(scope_request_context(context, async move {
            let _guard = guard;
            match storage.store(request).await {
                Ok(outcome) => tracing::debug!(
                    kind = %kind,
                    accepted = outcome.accepted,
                    reason = %outcome.reason,
                    "Background store finished"
                ),
                Err(e) => {
                    metrics::counter!("background_store_failures_total").increment(1);
                    tracing::error!(kind = %kind, error = %e, "Background store failed");
                },
            }
        }))
    }

    /// Number of background stores still running.
    #[must_use]
    pub fn pending_background(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Waits for background stores to finish, up to `timeout`.
    ///
    /// Returns true if every task finished in time.
    pub async fn drain_background(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.in_flight.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight.count.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        };

        let drained = tokio::time::timeout(timeout, wait).await.is_ok();
        if !drained {
            tracing::warn!(
                pending = self.pending_background(),
                "Background stores still running after drain timeout"
            );
        }
        drained
    }

    /// Ranked, budgeted retrieval.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate search fails.
    pub async fn retrieve(&self, request: &RetrieveRequest) -> Result<Vec<Memory>> {
        self.retrieval.retrieve(request).await
    }

    /// Aggregate counts and sizes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn stats(&self) -> Result<MemoryStats> {
        self.store.stats()
    }

    /// Newest memories matching `filter`, without review.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list(&self, filter: &SearchFilter, limit: usize) -> Result<Vec<Memory>> {
        self.store.search("", filter, limit)
    }

    /// Fetches one memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get(&self, id: &MemoryId) -> Result<Option<Memory>> {
        self.store.get(id)
    }

    /// Deletes one memory. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self, id), fields(memory_id = %id))]
    pub fn delete_memory(&self, id: &MemoryId) -> Result<bool> {
        let deleted = self.store.delete(id)?;
        if deleted {
            tracing::info!("Memory deleted");
        }
        Ok(deleted)
    }

    /// Deletes the working memories of one session. Returns how many.
    ///
    /// Memories of other kinds recorded in the session are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank session id, or an error if
    /// the delete fails.
    #[instrument(skip(self))]
    pub fn clear_scoped(&self, session_id: &str) -> Result<usize> {
        if session_id.trim().is_empty() {
            return Err(Error::InvalidInput("session id cannot be empty".to_string()));
        }

        let filter = SearchFilter::new()
            .with_kind(MemoryKind::Working)
            .with_session(session_id);
        let deleted = self.store.delete_matching(&filter)?;
        tracing::info!(deleted, "Cleared session working memory");
        Ok(deleted)
    }

    /// Deletes memories of `kind` created before `cutoff`. Returns how many.
    ///
    /// Nothing expires on its own; this is the scheduled decay hook.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(skip(self))]
    pub fn prune(&self, kind: MemoryKind, cutoff: DateTime<Utc>) -> Result<usize> {
        let filter = SearchFilter::new().with_kind(kind).created_before(cutoff);
        let deleted = self.store.delete_matching(&filter)?;
        tracing::info!(deleted, "Pruned memories");
        Ok(deleted)
    }

    /// The storage pipeline.
    #[must_use]
    pub fn storage(&self) -> &StoragePipeline {
        &self.storage
    }

    /// The retrieval pipeline.
    #[must_use]
    pub const fn retrieval(&self) -> &RetrievalPipeline {
        &self.retrieval
    }
}
