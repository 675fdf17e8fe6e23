//! Builds a [`Coordinator`] from configuration.
//!
//! Every scoring collaborator is wrapped in a [`ResilientScorer`] so that a
//! slow or failing panel member degrades to the panel minimum instead of
//! stalling the pipeline.

use crate::config::{LlmConfig, LlmProviderKind, MnemosConfig, ScorerBackend};
use crate::filter::TrivialFilter;
use crate::llm::{AnthropicClient, LlmProvider, OllamaClient};
use crate::review::{
    ConsensusReviewer, RelevanceScorer, ResilientScorer, ScorerResilienceConfig, StorageScorer,
    heuristic_relevance_panel, heuristic_storage_panel, llm_relevance_panel, llm_storage_panel,
};
use crate::services::{Coordinator, RetrievalPipeline, StoragePipeline};
use crate::storage::{MemoryStore, SqliteMemoryStore};
use crate::Result;
use std::sync::Arc;

/// Builds the Anthropic client from configuration.
#[must_use]
pub fn build_anthropic_client(llm: &LlmConfig) -> AnthropicClient {
    let mut client = AnthropicClient::new();
    if let Some(ref api_key) = llm.api_key {
        client = client.with_api_key(api_key);
    }
    if let Some(ref model) = llm.model {
        client = client.with_model(model);
    }
    if let Some(ref base_url) = llm.base_url {
        client = client.with_endpoint(base_url);
    }
    client.with_http_config(llm.http_config())
}

/// Builds the Ollama client from configuration.
#[must_use]
pub fn build_ollama_client(llm: &LlmConfig) -> OllamaClient {
    let mut client = OllamaClient::new();
    if let Some(ref model) = llm.model {
        client = client.with_model(model);
    }
    if let Some(ref base_url) = llm.base_url {
        client = client.with_endpoint(base_url);
    }
    client.with_http_config(llm.http_config())
}

/// Builds the configured LLM provider.
#[must_use]
pub fn build_llm_provider(llm: &LlmConfig) -> Arc<dyn LlmProvider> {
    match llm.provider {
        LlmProviderKind::Anthropic => Arc::new(build_anthropic_client(llm)),
        LlmProviderKind::Ollama => Arc::new(build_ollama_client(llm)),
    }
}

fn guard_storage(
    panel: Vec<Arc<dyn StorageScorer>>,
    resilience: &ScorerResilienceConfig,
) -> Vec<Arc<dyn StorageScorer>> {
    panel
        .into_iter()
        .map(|scorer| {
            Arc::new(ResilientScorer::new(scorer, resilience.clone())) as Arc<dyn StorageScorer>
        })
        .collect()
}

fn guard_relevance(
    panel: Vec<Arc<dyn RelevanceScorer>>,
    resilience: &ScorerResilienceConfig,
) -> Vec<Arc<dyn RelevanceScorer>> {
    panel
        .into_iter()
        .map(|scorer| {
            Arc::new(ResilientScorer::new(scorer, resilience.clone())) as Arc<dyn RelevanceScorer>
        })
        .collect()
}

/// Builds the consensus reviewer for the configured scorer backend.
///
/// # Errors
///
/// Returns an error if a panel has the wrong number of members.
pub fn build_reviewer(config: &MnemosConfig) -> Result<ConsensusReviewer> {
    let (storage, relevance) = match config.scorers.backend {
        ScorerBackend::Heuristic => (heuristic_storage_panel(), heuristic_relevance_panel()),
        ScorerBackend::Llm => {
            let provider = build_llm_provider(&config.llm);
            (llm_storage_panel(&provider), llm_relevance_panel(&provider))
        },
    };

    let resilience = config.scorers.resilience();
    ConsensusReviewer::new(
        guard_storage(storage, &resilience),
        guard_relevance(relevance, &resilience),
    )
}

/// Wires a coordinator over `store` with the configured panels and tuning.
///
/// # Errors
///
/// Returns an error if the reviewer cannot be built.
pub fn build_coordinator_with_store(
    config: &MnemosConfig,
    store: Arc<dyn MemoryStore>,
) -> Result<Coordinator> {
    let reviewer = Arc::new(build_reviewer(config)?);
    let filter = Arc::new(TrivialFilter::new(config.filter.clone()));

    let storage = StoragePipeline::new(Arc::clone(&store), filter, Arc::clone(&reviewer))
        .with_threshold(config.consensus.threshold);
    let retrieval = RetrievalPipeline::new(Arc::clone(&store), reviewer)
        .with_config(config.retrieval.pipeline_config());

    tracing::debug!(
        backend = ?config.scorers.backend,
        threshold = config.consensus.threshold,
        "Coordinator ready"
    );
    Ok(Coordinator::from_parts(store, storage, retrieval))
}

/// Opens the configured database and wires a coordinator over it.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the reviewer cannot
/// be built.
pub fn build_coordinator(config: &MnemosConfig) -> Result<Coordinator> {
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(config.database_path())?);
    build_coordinator_with_store(config, store)
}
