//! # Task Recall CLI (`recall`)
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and schema |
//! | `recall index pending` | Embed tasks with missing or stale embeddings |
//! | `recall index rebuild` | Delete and regenerate all task embeddings |
//! | `recall ask "<query>"` | Answer a query from task context |
//! | `recall serve` | Start the HTTP server |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `warn`), so
//! `recall ask` prints nothing but the answer on stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use task_recall::{config, db, index_cmd, migrate, respond::Responder, server, sqlite_store::SqliteStore};

/// Task Recall: answers questions about ongoing and completed tasks,
/// grounded in the closest matches from a local embedding index.
#[derive(Parser)]
#[command(name = "recall", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage the task embedding index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Answer a query and print the response.
    Ask {
        /// The question to answer.
        query: String,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Embed tasks that are missing embeddings or changed since indexing.
    Pending {
        /// Maximum number of tasks to embed.
        #[arg(long)]
        limit: Option<usize>,

        /// Only report how many tasks need embeddings.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete all embeddings and re-embed every task.
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("initialized");
        }
        Commands::Index { action } => match action {
            IndexAction::Pending { limit, dry_run } => {
                index_cmd::run_index_pending(&cfg, limit, dry_run).await?;
            }
            IndexAction::Rebuild => {
                index_cmd::run_index_rebuild(&cfg).await?;
            }
        },
        Commands::Ask { query } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let store = Arc::new(SqliteStore::new(pool));
            let responder = Responder::from_config(&cfg, store.clone(), store.clone())?;

            let answer = responder.generate_refined_response(&query).await;
            println!("{}", answer);

            store.pool().close().await;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
