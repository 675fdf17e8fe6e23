//! Binary entry point for mnemos.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use chrono::{DateTime, Utc};
use commands::{
    HookEvent, RetrieveArgs, StoreArgs, cmd_clear_session, cmd_config, cmd_delete, cmd_hook,
    cmd_prune, cmd_retrieve, cmd_stats, cmd_store, parse_key_value, parse_kind, parse_similarity,
    parse_since,
};
use mnemos::cli::build_coordinator;
use mnemos::config::MnemosConfig;
use mnemos::observability::{self, InitOptions, RequestContext, scope_request_context};
use mnemos::MemoryKind;
use std::path::PathBuf;
use std::process::ExitCode;

/// Mnemos - a consensus-reviewed memory store for AI agents.
#[derive(Parser)]
#[command(name = "mnemos")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MNEMOS_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Review and store a memory.
    Store {
        /// The content to store.
        content: String,

        /// Memory kind.
        #[arg(short, long, default_value = "decision", value_parser = parse_kind)]
        kind: MemoryKind,

        /// Session the memory belongs to.
        #[arg(short, long)]
        session: Option<String>,

        /// Metadata entry as key=value (repeatable).
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,

        /// Context entry as key=value (repeatable).
        #[arg(long, value_parser = parse_key_value)]
        context: Vec<(String, String)>,
    },

    /// Retrieve relevant memories.
    Retrieve {
        /// The query; empty lists the newest memories.
        #[arg(default_value = "")]
        query: String,

        /// Restrict to a kind (repeatable).
        #[arg(short, long, value_parser = parse_kind)]
        kind: Vec<MemoryKind>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Token budget for the result.
        #[arg(short = 't', long)]
        max_tokens: Option<usize>,

        /// Only memories created at or after this RFC 3339 instant.
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,

        /// Restrict to a session.
        #[arg(short, long)]
        session: Option<String>,

        /// Drop near-duplicate memories.
        #[arg(long)]
        dedup: bool,

        /// Dedup similarity threshold; implies --dedup.
        #[arg(long, value_parser = parse_similarity)]
        similarity: Option<f64>,

        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show store statistics.
    Stats {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a memory by id.
    Delete {
        /// Memory id.
        id: String,
    },

    /// Delete a session's working memories.
    ClearSession {
        /// Session id.
        session: String,
    },

    /// Delete memories of a kind older than a cutoff.
    Prune {
        /// Memory kind.
        #[arg(short, long, value_parser = parse_kind)]
        kind: MemoryKind,

        /// Age in days.
        #[arg(long, default_value = "30")]
        older_than_days: u32,
    },

    /// Handle agent lifecycle hooks.
    Hook {
        /// Hook event type.
        #[command(subcommand)]
        event: HookEvent,
    },

    /// Show configuration.
    Config {
        /// Print the full resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

impl Commands {
    const fn origin(&self) -> &'static str {
        match self {
            Self::Store { .. } => "cli:store",
            Self::Retrieve { .. } => "cli:retrieve",
            Self::Stats { .. } => "cli:stats",
            Self::Delete { .. } => "cli:delete",
            Self::ClearSession { .. } => "cli:clear-session",
            Self::Prune { .. } => "cli:prune",
            Self::Hook { event } => match event {
                HookEvent::UserPromptSubmit => "hook:user-prompt-submit",
                HookEvent::TaskComplete => "hook:task-complete",
                HookEvent::SessionEnd => "hook:session-end",
            },
            Self::Config { .. } => "cli:config",
        }
    }
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match MnemosConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init(observability::config_from(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: false,
        },
    )) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let context = RequestContext::new().with_origin(cli.command.origin());
    let result = scope_request_context(context, run_command(cli.command, config)).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(
    command: Commands,
    config: MnemosConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Hook { event } => return cmd_hook(event, &config).await,
        Commands::Config { show } => return cmd_config(&config, show),
        _ => {},
    }

    let coordinator = build_coordinator(&config)?;

    match command {
        Commands::Store {
            content,
            kind,
            session,
            meta,
            context,
        } => {
            let args = StoreArgs {
                content,
                kind,
                session,
                metadata: meta,
                context,
            };
            cmd_store(&coordinator, args).await
        },

        Commands::Retrieve {
            query,
            kind,
            limit,
            max_tokens,
            since,
            session,
            dedup,
            similarity,
            json,
        } => {
            let args = RetrieveArgs {
                query,
                kinds: kind,
                limit: limit.unwrap_or(config.retrieval.default_limit),
                max_tokens,
                since,
                session,
                dedup,
                similarity,
                json,
            };
            cmd_retrieve(&coordinator, config.retrieval.similarity_threshold, args).await
        },

        Commands::Stats { json } => cmd_stats(&coordinator, json),

        Commands::Delete { id } => cmd_delete(&coordinator, &id),

        Commands::ClearSession { session } => cmd_clear_session(&coordinator, &session),

        Commands::Prune {
            kind,
            older_than_days,
        } => cmd_prune(&coordinator, kind, older_than_days),

        Commands::Hook { .. } | Commands::Config { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_retrieve_defaults() {
        let cli = Cli::try_parse_from(["mnemos", "retrieve", "auth", "-k", "decision", "--dedup"])
            .unwrap();
        match cli.command {
            Commands::Retrieve {
                query,
                kind,
                limit,
                dedup,
                ..
            } => {
                assert_eq!(query, "auth");
                assert_eq!(kind, vec![MemoryKind::Decision]);
                assert!(limit.is_none());
                assert!(dedup);
            },
            _ => unreachable!("expected retrieve"),
        }
    }

    #[test]
    fn test_store_collects_pairs() {
        let cli = Cli::try_parse_from([
            "mnemos", "store", "Use SQLite", "--meta", "repo=mnemos", "--context", "branch=main",
            "--meta", "area=storage",
        ])
        .unwrap();
        match cli.command {
            Commands::Store { meta, context, .. } => {
                assert_eq!(meta.len(), 2);
                assert_eq!(meta[1], ("area".to_string(), "storage".to_string()));
                assert_eq!(context, vec![("branch".to_string(), "main".to_string())]);
            },
            _ => unreachable!("expected store"),
        }
    }

    #[test]
    fn test_retrieve_since_and_similarity() {
        let cli = Cli::try_parse_from([
            "mnemos",
            "retrieve",
            "--since",
            "2026-01-01T00:00:00Z",
            "--similarity",
            "0.7",
        ])
        .unwrap();
        match cli.command {
            Commands::Retrieve {
                query,
                since,
                similarity,
                ..
            } => {
                assert!(query.is_empty());
                assert!(since.is_some());
                assert_eq!(similarity, Some(0.7));
            },
            _ => unreachable!("expected retrieve"),
        }
        assert!(Cli::try_parse_from(["mnemos", "retrieve", "--since", "last week"]).is_err());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["mnemos", "store", "x", "--kind", "episodic"]).is_err());
    }
}
