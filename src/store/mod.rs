//! Storage abstraction for Task Recall.
//!
//! The retrieval engine talks to two external collaborators through the
//! traits defined here:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`VectorIndex`] | Nearest-neighbour search over stored task embeddings |
//! | [`RecordStore`] | Batched lookup of raw task rows by identity and kind |
//!
//! Implementations must be `Send + Sync` to work with async runtimes. The
//! SQLite implementation lives in [`crate::sqlite_store`]; [`memory`] holds
//! an in-memory implementation for tests and embedding.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{IndexRow, TaskKind};

/// Nearest-neighbour search over serialized query vectors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_n` rows ordered by ascending distance.
    ///
    /// `query` is the packed little-endian `f32` layout produced by
    /// [`vec_to_blob`](crate::embedding::vec_to_blob).
    async fn search(&self, query: &[u8], top_n: usize) -> Result<Vec<IndexRow>>;
}

/// Relational lookup of raw task rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch every row of `kind` whose identity is in `ids`, in any order.
    ///
    /// Rows are returned as JSON objects keyed by column name; the field
    /// sanitizer decides what is usable.
    async fn fetch_records(&self, kind: TaskKind, ids: &[String]) -> Result<Vec<Value>>;
}
