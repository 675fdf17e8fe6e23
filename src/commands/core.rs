//! Core command handlers.

use chrono::{DateTime, Duration, Utc};
use mnemos::{Coordinator, MemoryId, MemoryKind, RetrieveRequest, StoreRequest};

/// Options for the store command.
pub struct StoreArgs {
    /// Memory content.
    pub content: String,
    /// Memory kind.
    pub kind: MemoryKind,
    /// Owning session.
    pub session: Option<String>,
    /// Metadata pairs.
    pub metadata: Vec<(String, String)>,
    /// Context pairs shown to the reviewers.
    pub context: Vec<(String, String)>,
}

/// Store command.
pub async fn cmd_store(
    coordinator: &Coordinator,
    args: StoreArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let kind = args.kind;
    let mut request = StoreRequest::new(args.content, kind).with_context("source", "cli");
    for (key, value) in args.metadata {
        request = request.with_metadata(key, value);
    }
    for (key, value) in args.context {
        request = request.with_context(key, value);
    }
    if let Some(session) = args.session {
        request = request.with_session(session);
    }

    let outcome = coordinator.store(request).await?;

    if let Some(id) = outcome.memory_id.as_ref().filter(|_| outcome.accepted) {
        println!("Memory stored:");
        println!("  ID: {}", id.as_str());
        println!("  Kind: {kind}");
        println!("  Consensus: {:.2}", outcome.consensus_score);
    } else {
        println!("Not stored: {}", outcome.reason);
    }

    Ok(())
}

/// Options for the retrieve command.
pub struct RetrieveArgs {
    /// Query text.
    pub query: String,
    /// Kind filters.
    pub kinds: Vec<MemoryKind>,
    /// Result limit.
    pub limit: usize,
    /// Token budget.
    pub max_tokens: Option<usize>,
    /// Only memories created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Session filter.
    pub session: Option<String>,
    /// Drop near-duplicates.
    pub dedup: bool,
    /// Overrides the configured dedup threshold.
    pub similarity: Option<f64>,
    /// Emit JSON.
    pub json: bool,
}

/// Retrieve command.
pub async fn cmd_retrieve(
    coordinator: &Coordinator,
    similarity_threshold: f64,
    args: RetrieveArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = args
        .kinds
        .into_iter()
        .fold(RetrieveRequest::new(args.query), RetrieveRequest::with_kind)
        .with_limit(args.limit);
    if let Some(max_tokens) = args.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    if let Some(since) = args.since {
        request = request.since(since);
    }
    if let Some(session) = args.session {
        request = request.with_session(session);
    }
    if args.dedup || args.similarity.is_some() {
        request = request.deduplicated(args.similarity.unwrap_or(similarity_threshold));
    }

    let memories = coordinator.retrieve(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&memories)?);
        return Ok(());
    }

    println!("Found {} memories:", memories.len());
    println!();
    for memory in &memories {
        println!(
            "  [{:.2}] {} ({}, {} tokens)",
            memory.relevance_score.unwrap_or(0.0),
            memory.id.as_str(),
            memory.kind,
            memory.token_count
        );
        let content: String = memory.content.chars().take(100).collect();
        if content.len() < memory.content.len() {
            println!("         {content}...");
        } else {
            println!("         {content}");
        }
    }

    Ok(())
}

/// Stats command.
pub fn cmd_stats(coordinator: &Coordinator, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let stats = coordinator.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Memory Statistics");
    println!("=================");
    println!("Total: {}", stats.total);
    println!("Tokens: {}", stats.total_tokens);
    for (kind, count) in &stats.by_kind {
        println!("  {kind:<12} {count}");
    }
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("Oldest: {}", oldest.to_rfc3339());
        println!("Newest: {}", newest.to_rfc3339());
    }

    Ok(())
}

/// Delete command.
pub fn cmd_delete(coordinator: &Coordinator, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if coordinator.delete_memory(&MemoryId::new(id))? {
        println!("Deleted {id}");
    } else {
        println!("No memory with id {id}");
    }
    Ok(())
}

/// Clear-session command.
pub fn cmd_clear_session(
    coordinator: &Coordinator,
    session: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let deleted = coordinator.clear_scoped(session)?;
    println!("Cleared {deleted} working memories from session {session}");
    Ok(())
}

/// Prune command.
pub fn cmd_prune(
    coordinator: &Coordinator,
    kind: MemoryKind,
    older_than_days: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
    let deleted = coordinator.prune(kind, cutoff)?;
    println!("Pruned {deleted} {kind} memories older than {older_than_days} days");
    Ok(())
}
