//! `recall index` subcommands.
//!
//! Keeps `task_embeddings` in step with the `tasks` and `historic_tasks`
//! tables. A task is pending when it has no embedding for the configured
//! model or its title/description changed since it was last embedded
//! (tracked by a SHA-256 of the embedded text).

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::embedding::{self, QueryCodec};
use crate::sqlite_store::{PendingTask, SqliteStore};

/// Outcome counters for one indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub embedded: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Embed tasks that are missing or have stale embeddings.
pub async fn run_index_pending(config: &Config, limit: Option<usize>, dry_run: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let codec = codec_from_config(config)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let pending = store.pending_tasks(codec.model_name(), limit).await?;

    if dry_run {
        println!("index pending (dry-run)");
        println!("  tasks needing embeddings: {}", pending.len());
        store.pool().close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("index pending");
        println!("  all tasks up to date");
        store.pool().close().await;
        return Ok(());
    }

    let total = pending.len();
    let summary = index_tasks(&store, &codec, &pending, config.embedding.dims).await?;

    println!("index pending");
    println!("  total pending: {}", total);
    print_summary(&summary);

    store.pool().close().await;
    Ok(())
}

/// Delete all embeddings and regenerate them for every task.
pub async fn run_index_rebuild(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let codec = codec_from_config(config)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let cleared = store.clear_embeddings().await?;
    println!("index rebuild: cleared {} embeddings", cleared);

    let pending = store.pending_tasks(codec.model_name(), None).await?;
    if pending.is_empty() {
        println!("  no tasks to embed");
        store.pool().close().await;
        return Ok(());
    }

    let total = pending.len();
    let summary = index_tasks(&store, &codec, &pending, config.embedding.dims).await?;

    println!("index rebuild");
    println!("  total tasks: {}", total);
    print_summary(&summary);

    store.pool().close().await;
    Ok(())
}

/// Embed and store each pending task.
///
/// Provider failures and dimension mismatches are counted and logged; they
/// do not abort the run. Storage errors do.
pub async fn index_tasks(
    store: &SqliteStore,
    codec: &QueryCodec,
    pending: &[PendingTask],
    expected_dims: Option<usize>,
) -> Result<IndexSummary> {
    let mut summary = IndexSummary::default();

    for task in pending {
        if task.text.is_empty() {
            tracing::debug!(id = %task.id, kind = ?task.kind, "task has no text to embed");
            summary.skipped += 1;
            continue;
        }

        let vector = match codec.embed(&task.text).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(id = %task.id, kind = ?task.kind, error = %e, "embedding failed");
                summary.failed += 1;
                continue;
            }
        };

        if let Some(dims) = expected_dims {
            if vector.len() != dims {
                tracing::warn!(
                    id = %task.id,
                    expected = dims,
                    found = vector.len(),
                    "embedding has unexpected dimensions"
                );
                summary.failed += 1;
                continue;
            }
        }

        let blob = embedding::vec_to_blob(&vector);
        store
            .upsert_embedding(task.kind, &task.id, &blob, codec.model_name(), &task.text_hash)
            .await?;
        summary.embedded += 1;
    }

    Ok(summary)
}

fn codec_from_config(config: &Config) -> Result<QueryCodec> {
    let provider = embedding::create_provider(&config.embedding)?;
    Ok(QueryCodec::new(provider, config.embedding.timeout()))
}

fn print_summary(summary: &IndexSummary) {
    println!("  embedded: {}", summary.embedded);
    println!("  skipped: {}", summary.skipped);
    println!("  failed: {}", summary.failed);
}

