//! In-memory [`VectorIndex`] + [`RecordStore`] for tests and embedding.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine distance over all stored vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::{blob_to_vec, cosine_distance};
use crate::models::{by_distance, IndexRow, TaskKind};

use super::{RecordStore, VectorIndex};

struct StoredTask {
    raw: Value,
    vector: Option<Vec<f32>>,
}

/// In-memory task store.
#[derive(Default)]
pub struct InMemoryStore {
    tasks: RwLock<HashMap<(TaskKind, String), StoredTask>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task row, optionally with its embedding.
    pub fn insert(
        &self,
        kind: TaskKind,
        id: &str,
        raw: Value,
        vector: Option<Vec<f32>>,
    ) -> Result<()> {
        let mut tasks = self
            .tasks
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        tasks.insert((kind, id.to_string()), StoredTask { raw, vector });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn search(&self, query: &[u8], top_n: usize) -> Result<Vec<IndexRow>> {
        let query_vec = blob_to_vec(query);
        let tasks = self
            .tasks
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;

        let mut rows: Vec<IndexRow> = tasks
            .iter()
            .filter_map(|((kind, id), task)| {
                let vector = task.vector.as_ref()?;
                Some(IndexRow::new(
                    id.clone(),
                    kind.storage_tag(),
                    cosine_distance(&query_vec, vector),
                ))
            })
            .collect();

        rows.sort_by(by_distance);
        rows.truncate(top_n);
        Ok(rows)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn fetch_records(&self, kind: TaskKind, ids: &[String]) -> Result<Vec<Value>> {
        let tasks = self
            .tasks
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(ids
            .iter()
            .filter_map(|id| tasks.get(&(kind, id.clone())).map(|t| t.raw.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::vec_to_blob;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let store = InMemoryStore::new();
        store
            .insert(TaskKind::Active, "far", json!({"id": "far"}), Some(vec![0.0, 1.0]))
            .unwrap();
        store
            .insert(
                TaskKind::Historical,
                "near",
                json!({"id": "near"}),
                Some(vec![1.0, 0.1]),
            )
            .unwrap();
        store
            .insert(TaskKind::Active, "unindexed", json!({"id": "unindexed"}), None)
            .unwrap();

        let rows = store.search(&vec_to_blob(&[1.0, 0.0]), 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, Some(json!("near")));
        assert_eq!(rows[0].kind.as_deref(), Some("historic_task"));
        assert_eq!(rows[1].id, Some(json!("far")));
    }

    #[tokio::test]
    async fn test_large_vectors_rank_by_finite_distance() {
        let store = InMemoryStore::new();
        for i in 0..195 {
            store
                .insert(
                    TaskKind::Active,
                    &format!("small-{}", i),
                    json!({"id": i}),
                    Some(vec![1.0, -(i as f32) - 1.0]),
                )
                .unwrap();
        }
        for i in 0..5 {
            store
                .insert(
                    TaskKind::Historical,
                    &format!("huge-{}", i),
                    json!({"id": i}),
                    Some(vec![3e38, 3e38]),
                )
                .unwrap();
        }

        let rows = store.search(&vec_to_blob(&[3e38, 3e38]), 10).await.unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.distance.unwrap().is_finite()));
        assert!(rows
            .windows(2)
            .all(|w| w[0].distance.unwrap() <= w[1].distance.unwrap()));
        for row in &rows[..5] {
            let id = row.id.as_ref().and_then(|v| v.as_str()).unwrap();
            assert!(id.starts_with("huge-"), "unexpected leader {}", id);
        }
    }

    #[tokio::test]
    async fn test_search_respects_top_n() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .insert(
                    TaskKind::Active,
                    &i.to_string(),
                    json!({"id": i}),
                    Some(vec![1.0, i as f32]),
                )
                .unwrap();
        }
        let rows = store.search(&vec_to_blob(&[1.0, 0.0]), 3).await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_records_filters_by_kind() {
        let store = InMemoryStore::new();
        store
            .insert(TaskKind::Active, "1", json!({"id": 1, "title": "a"}), None)
            .unwrap();
        store
            .insert(TaskKind::Historical, "1", json!({"id": 1, "title": "h"}), None)
            .unwrap();

        let active = store
            .fetch_records(TaskKind::Active, &["1".to_string(), "2".to_string()])
            .await
            .unwrap();
        assert_eq!(active, vec![json!({"id": 1, "title": "a"})]);
        assert_eq!(store.len(), 2);
    }
}
