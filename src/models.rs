//! Core data models used throughout Task Recall.
//!
//! These types describe what flows through the retrieval pipeline: rows
//! returned by the vector index, the raw records resolved from the
//! relational store, and the sanitized [`CanonicalRecord`] that the context
//! assembler renders.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of records that may reach the context block.
pub const MAX_CONTEXT_RECORDS: usize = 10;

/// The two record kinds the vector index knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// A task that is still open (`tasks` table).
    Active,
    /// A task that has been completed and archived (`historic_tasks` table).
    Historical,
}

impl TaskKind {
    /// Parse the kind tag stored next to an embedding.
    ///
    /// Accepts the storage tags (`"task"`, `"historic_task"`) as well as the
    /// canonical names. Anything else is not a usable kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "task" | "active" => Some(TaskKind::Active),
            "historic_task" | "historical" => Some(TaskKind::Historical),
            _ => None,
        }
    }

    /// Tag written into `task_embeddings.type`.
    pub fn storage_tag(self) -> &'static str {
        match self {
            TaskKind::Active => "task",
            TaskKind::Historical => "historic_task",
        }
    }

    /// Upper-case label used in the rendered context block.
    pub fn context_label(self) -> &'static str {
        match self {
            TaskKind::Active => "ONGOING_TASK",
            TaskKind::Historical => "PAST_COMPLETED_TASK",
        }
    }
}

/// A row as returned by a [`VectorIndex`](crate::store::VectorIndex).
///
/// Fields are optional because the index is an external collaborator;
/// rows lacking an identity or a recognised kind are dropped by
/// [`IndexRow::into_hit`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
}

impl IndexRow {
    pub fn new(id: impl Into<Value>, kind: &str, distance: f64) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(kind.to_string()),
            distance: Some(distance),
        }
    }

    /// Validate the row into a usable [`RetrievalHit`].
    pub fn into_hit(self) -> Option<RetrievalHit> {
        let id = self.id.as_ref().and_then(identity_of)?;
        let kind = TaskKind::from_tag(self.kind.as_deref()?)?;
        Some(RetrievalHit {
            id,
            kind,
            distance: self.distance.unwrap_or(f64::INFINITY),
        })
    }
}

/// Order index rows by ascending distance; a missing or NaN distance sorts
/// last.
pub fn by_distance(a: &IndexRow, b: &IndexRow) -> std::cmp::Ordering {
    let key = |d: Option<f64>| d.filter(|d| !d.is_nan()).unwrap_or(f64::INFINITY);
    key(a.distance).total_cmp(&key(b.distance))
}

/// A validated nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    pub id: String,
    pub kind: TaskKind,
    pub distance: f64,
}

/// A raw record resolved from the relational store, tagged by the table
/// it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRecord {
    Active(Value),
    Historical(Value),
}

impl TaskRecord {
    pub fn new(kind: TaskKind, raw: Value) -> Self {
        match kind {
            TaskKind::Active => TaskRecord::Active(raw),
            TaskKind::Historical => TaskRecord::Historical(raw),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRecord::Active(_) => TaskKind::Active,
            TaskRecord::Historical(_) => TaskKind::Historical,
        }
    }

    pub fn raw(&self) -> &Value {
        match self {
            TaskRecord::Active(raw) | TaskRecord::Historical(raw) => raw,
        }
    }
}

/// Sanitized, unified view of an active or historical task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub due_date: String,
    pub created_at: String,
    pub completion_date: Option<String>,
    pub kind: TaskKind,
}

/// Normalize a JSON identity into its string form.
///
/// Non-empty strings and non-zero numbers are identities; everything else
/// (including `0` and `""`) is not.
pub fn identity_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                (i != 0).then(|| i.to_string())
            } else if let Some(u) = n.as_u64() {
                (u != 0).then(|| u.to_string())
            } else {
                n.as_f64()
                    .filter(|f| *f != 0.0 && f.is_finite())
                    .map(|f| f.to_string())
            }
        }
        _ => None,
    }
}
