//! Vector retrieval engine.
//!
//! Turns a serialized query vector into an ordered list of
//! [`CanonicalRecord`]s.
//!
//! # Algorithm
//!
//! 1. Ask the [`VectorIndex`] for `top_n` rows (clamped to `1..=10`).
//! 2. Drop rows without an identity or a recognised kind.
//! 3. Partition the surviving hits into active and historical identity sets.
//! 4. Resolve each non-empty set with one batched [`RecordStore`] lookup;
//!    the two lookups run concurrently.
//! 5. Sanitize every resolved row, dropping rows that fail.
//! 6. Walk the hits in index order and emit the matching record, so the
//!    index's relevance order is authoritative.
//! 7. Emit each identity at most once, whichever kind it appears under.
//! 8. Truncate to [`MAX_CONTEXT_RECORDS`].
//!
//! Any failure or timeout along the way yields an empty list; retrieval
//! never returns an error to its caller.

use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{
    CanonicalRecord, IndexRow, RetrievalHit, TaskKind, TaskRecord, MAX_CONTEXT_RECORDS,
};
use crate::store::{RecordStore, VectorIndex};

/// Clamp a caller-requested hit count to `1..=MAX_CONTEXT_RECORDS`.
pub fn clamp_top_n(requested: usize) -> usize {
    requested.clamp(1, MAX_CONTEXT_RECORDS)
}

async fn bounded<T>(
    what: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| anyhow!("{} timed out after {:?}", what, limit))?
}

#[derive(Clone)]
pub struct RetrievalEngine {
    index: Arc<dyn VectorIndex>,
    records: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        records: Arc<dyn RecordStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            index,
            records,
            timeout,
        }
    }

    /// Retrieve the most relevant records for `query`.
    ///
    /// Returns an empty list on any collaborator failure.
    pub async fn retrieve(&self, query: &[u8], top_n: usize) -> Vec<CanonicalRecord> {
        match self.try_retrieve(query, clamp_top_n(top_n)).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "retrieval failed");
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, query: &[u8], top_n: usize) -> Result<Vec<CanonicalRecord>> {
        let rows = bounded("vector search", self.timeout, self.index.search(query, top_n)).await?;
        let row_count = rows.len();

        let hits: Vec<RetrievalHit> = rows.into_iter().filter_map(IndexRow::into_hit).collect();
        if hits.len() < row_count {
            tracing::debug!(
                dropped = row_count - hits.len(),
                "dropped index rows without identity or kind"
            );
        }

        let active_ids = identity_set(&hits, TaskKind::Active);
        let historical_ids = identity_set(&hits, TaskKind::Historical);

        let (active, historical) = tokio::try_join!(
            self.resolve(TaskKind::Active, &active_ids),
            self.resolve(TaskKind::Historical, &historical_ids),
        )?;

        let records = order_by_relevance(&hits, &active, &historical);
        tracing::debug!(
            hits = hits.len(),
            records = records.len(),
            "retrieval complete"
        );
        Ok(records)
    }

    async fn resolve(
        &self,
        kind: TaskKind,
        ids: &[String],
    ) -> Result<HashMap<String, CanonicalRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = bounded(
            "record lookup",
            self.timeout,
            self.records.fetch_records(kind, ids),
        )
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|raw| TaskRecord::new(kind, raw).sanitize())
            .map(|record| (record.id.clone(), record))
            .collect())
    }
}

/// Distinct identities of `kind`, in hit order.
fn identity_set(hits: &[RetrievalHit], kind: TaskKind) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for hit in hits.iter().filter(|hit| hit.kind == kind) {
        if seen.insert(hit.id.as_str()) {
            ids.push(hit.id.clone());
        }
    }
    ids
}

/// Re-assemble resolved records in hit order, first occurrence per identity.
fn order_by_relevance(
    hits: &[RetrievalHit],
    active: &HashMap<String, CanonicalRecord>,
    historical: &HashMap<String, CanonicalRecord>,
) -> Vec<CanonicalRecord> {
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(hits.len().min(MAX_CONTEXT_RECORDS));

    for hit in hits {
        if out.len() == MAX_CONTEXT_RECORDS {
            break;
        }
        if emitted.contains(hit.id.as_str()) {
            continue;
        }
        let resolved = match hit.kind {
            TaskKind::Active => active.get(&hit.id),
            TaskKind::Historical => historical.get(&hit.id),
        };
        if let Some(record) = resolved {
            emitted.insert(hit.id.as_str());
            out.push(record.clone());
        }
    }

    out
}
