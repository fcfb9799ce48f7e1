//! Database schema migrations (idempotent).
//!
//! The relational tables mirror the columns the retrieval pipeline reads;
//! `task_embeddings` is the vector index, one BLOB per task and kind.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index if missing.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            task_id TEXT PRIMARY KEY,
            user_id INTEGER,
            parent_task_id TEXT,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT,
            priority TEXT,
            due_date TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS historic_tasks (
            historic_task_id TEXT PRIMARY KEY,
            original_task_id TEXT,
            original_parent_task_id TEXT,
            title TEXT,
            description TEXT,
            priority TEXT,
            due_date TEXT,
            completion_date TEXT,
            created_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // `type` is 'task' or 'historic_task'
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_embeddings (
            id TEXT NOT NULL,
            type TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            hash TEXT NOT NULL,
            indexed_at INTEGER NOT NULL,
            PRIMARY KEY (id, type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_user_id ON tasks(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_task_embeddings_model ON task_embeddings(model)")
        .execute(pool)
        .await?;

    Ok(())
}
