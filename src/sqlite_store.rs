//! SQLite-backed [`VectorIndex`] and [`RecordStore`].
//!
//! Task rows live in `tasks` and `historic_tasks`; embeddings live in
//! `task_embeddings` as packed little-endian `f32` BLOBs. Vector search is
//! brute force: every stored vector is decoded and scored by cosine
//! distance in Rust, then the closest `top_n` are returned.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance};
use crate::models::{by_distance, IndexRow, TaskKind};
use crate::store::{RecordStore, VectorIndex};

const ACTIVE_COLUMNS: [&str; 8] = [
    "id",
    "parent_task_id",
    "title",
    "description",
    "status",
    "priority",
    "due_date",
    "created_at",
];

const HISTORICAL_COLUMNS: [&str; 9] = [
    "id",
    "original_task_id",
    "original_parent_task_id",
    "title",
    "description",
    "priority",
    "due_date",
    "completion_date",
    "created_at",
];

/// A task whose embedding is missing or out of date.
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub kind: TaskKind,
    pub id: String,
    /// Text fed to the embedding provider.
    pub text: String,
    pub text_hash: String,
}

/// SQLite implementation of the store traits.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Tasks of both kinds with no embedding for `model`, or whose text
    /// changed since they were embedded.
    pub async fn pending_tasks(&self, model: &str, limit: Option<usize>) -> Result<Vec<PendingTask>> {
        let mut pending = Vec::new();

        for (kind, sql) in [
            (
                TaskKind::Active,
                r#"
                SELECT t.task_id AS id, t.title, t.description, e.hash, e.model
                FROM tasks t
                LEFT JOIN task_embeddings e ON e.id = t.task_id AND e.type = 'task'
                ORDER BY t.task_id
                "#,
            ),
            (
                TaskKind::Historical,
                r#"
                SELECT h.historic_task_id AS id, h.title, h.description, e.hash, e.model
                FROM historic_tasks h
                LEFT JOIN task_embeddings e ON e.id = h.historic_task_id AND e.type = 'historic_task'
                ORDER BY h.historic_task_id
                "#,
            ),
        ] {
            let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
            for row in rows {
                let title: Option<String> = row.try_get("title")?;
                let description: Option<String> = row.try_get("description")?;
                let text = embedding_text(title.as_deref(), description.as_deref());
                let text_hash = hash_text(&text);

                let stored_hash: Option<String> = row.try_get("hash")?;
                let stored_model: Option<String> = row.try_get("model")?;
                let up_to_date = stored_hash.as_deref() == Some(text_hash.as_str())
                    && stored_model.as_deref() == Some(model);
                if !up_to_date {
                    pending.push(PendingTask {
                        kind,
                        id: row.try_get("id")?,
                        text,
                        text_hash,
                    });
                }
            }
        }

        if let Some(limit) = limit {
            pending.truncate(limit);
        }
        Ok(pending)
    }

    /// Store or replace the embedding of one task.
    pub async fn upsert_embedding(
        &self,
        kind: TaskKind,
        id: &str,
        blob: &[u8],
        model: &str,
        text_hash: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO task_embeddings (id, type, embedding, model, hash, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id, type) DO UPDATE SET
                embedding = excluded.embedding,
                model = excluded.model,
                hash = excluded.hash,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(id)
        .bind(kind.storage_tag())
        .bind(blob)
        .bind(model)
        .bind(text_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete every stored embedding; returns how many were removed.
    pub async fn clear_embeddings(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM task_embeddings")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Text embedded for a task: title and description, one per line.
pub fn embedding_text(title: Option<&str>, description: Option<&str>) -> String {
    [title, description]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn hash_text(text: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn row_to_json(row: &SqliteRow, columns: &[&str]) -> Result<Value> {
    let mut obj = Map::new();
    for column in columns {
        let value: Option<String> = row.try_get(*column)?;
        obj.insert(
            column.to_string(),
            value.map(Value::String).unwrap_or(Value::Null),
        );
    }
    Ok(Value::Object(obj))
}

#[async_trait]
impl VectorIndex for SqliteStore {
    async fn search(&self, query: &[u8], top_n: usize) -> Result<Vec<IndexRow>> {
        let query_vec = blob_to_vec(query);

        let rows = sqlx::query("SELECT id, type, embedding FROM task_embeddings")
            .fetch_all(&self.pool)
            .await?;

        let mut hits = rows
            .iter()
            .map(|row| -> Result<IndexRow> {
                let id: String = row.try_get("id")?;
                let kind: String = row.try_get("type")?;
                let blob: Vec<u8> = row.try_get("embedding")?;
                let distance = cosine_distance(&query_vec, &blob_to_vec(&blob));
                Ok(IndexRow {
                    id: Some(Value::String(id)),
                    kind: Some(kind),
                    distance: Some(distance),
                })
            })
            .collect::<Result<Vec<IndexRow>>>()?;

        hits.sort_by(by_distance);
        hits.truncate(top_n);
        Ok(hits)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn fetch_records(&self, kind: TaskKind, ids: &[String]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let (sql, columns): (String, &[&str]) = match kind {
            TaskKind::Active => (
                format!(
                    "SELECT task_id AS id, parent_task_id, title, description, status, \
                     priority, due_date, created_at \
                     FROM tasks WHERE task_id IN ({})",
                    placeholders
                ),
                &ACTIVE_COLUMNS[..],
            ),
            TaskKind::Historical => (
                format!(
                    "SELECT historic_task_id AS id, original_task_id, original_parent_task_id, \
                     title, description, priority, due_date, completion_date, created_at \
                     FROM historic_tasks WHERE historic_task_id IN ({})",
                    placeholders
                ),
                &HISTORICAL_COLUMNS[..],
            ),
        };

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| row_to_json(row, columns))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_skips_missing_parts() {
        assert_eq!(embedding_text(Some("Title"), Some("Body")), "Title\nBody");
        assert_eq!(embedding_text(Some("Title"), None), "Title");
        assert_eq!(embedding_text(None, Some("  ")), "");
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_text("abc"), hash_text("abc"));
        assert_ne!(hash_text("abc"), hash_text("abd"));
        assert_eq!(hash_text("").len(), 64);
    }
}
