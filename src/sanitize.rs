//! Field sanitizer: normalizes raw task rows into [`CanonicalRecord`]s.
//!
//! Active and historical rows come from different tables and carry
//! different identity columns (`task_id` vs `historic_task_id`) and optional
//! columns (`status` vs `completion_date`). Both shapes are folded into one
//! canonical shape here, with every string field truncated and stripped of
//! angle brackets so nothing markup-like reaches the prompt.

use serde_json::Value;

use crate::models::{identity_of, CanonicalRecord, TaskKind, TaskRecord};

/// Maximum number of characters kept from any string field.
pub const MAX_FIELD_CHARS: usize = 1000;

pub const DEFAULT_TITLE: &str = "Untitled Task";
pub const DEFAULT_DESCRIPTION: &str = "No description provided.";
pub const DEFAULT_STATUS: &str = "unknown";
pub const DEFAULT_PRIORITY: &str = "none";
pub const DEFAULT_DUE_DATE: &str = "not set";
pub const DEFAULT_CREATED_AT: &str = "unknown";

/// Identity columns, checked in order.
const IDENTITY_FIELDS: [&str; 3] = ["id", "task_id", "historic_task_id"];

/// Truncate to [`MAX_FIELD_CHARS`] characters and drop `<` / `>`.
///
/// Non-string values sanitize to the empty string.
pub fn sanitize_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s
            .chars()
            .take(MAX_FIELD_CHARS)
            .filter(|c| *c != '<' && *c != '>')
            .collect(),
        _ => String::new(),
    }
}

fn field_or(raw: &Value, key: &str, default: &str) -> String {
    let s = sanitize_string(raw.get(key));
    if s.is_empty() {
        default.to_string()
    } else {
        s
    }
}

fn optional_field(raw: &Value, key: &str) -> Option<String> {
    Some(sanitize_string(raw.get(key))).filter(|s| !s.is_empty())
}

/// Sanitize a raw row of the given kind.
///
/// Returns `None` when `raw` is not a JSON object or carries no usable
/// identity.
pub fn sanitize_record(raw: &Value, kind: TaskKind) -> Option<CanonicalRecord> {
    let obj = raw.as_object()?;
    let id = IDENTITY_FIELDS
        .iter()
        .find_map(|key| obj.get(*key).and_then(identity_of))?;

    Some(CanonicalRecord {
        id,
        title: field_or(raw, "title", DEFAULT_TITLE),
        description: field_or(raw, "description", DEFAULT_DESCRIPTION),
        status: field_or(raw, "status", DEFAULT_STATUS),
        priority: field_or(raw, "priority", DEFAULT_PRIORITY),
        due_date: field_or(raw, "due_date", DEFAULT_DUE_DATE),
        created_at: field_or(raw, "created_at", DEFAULT_CREATED_AT),
        completion_date: optional_field(raw, "completion_date"),
        kind,
    })
}

impl TaskRecord {
    /// Normalize into the canonical shape; see [`sanitize_record`].
    pub fn sanitize(&self) -> Option<CanonicalRecord> {
        sanitize_record(self.raw(), self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_object_is_rejected() {
        assert!(sanitize_record(&json!("task"), TaskKind::Active).is_none());
        assert!(sanitize_record(&json!(null), TaskKind::Active).is_none());
        assert!(sanitize_record(&json!([{"id": 1}]), TaskKind::Active).is_none());
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let raw = json!({"title": "orphan"});
        assert!(sanitize_record(&raw, TaskKind::Active).is_none());
        let zero = json!({"id": 0, "title": "zero"});
        assert!(sanitize_record(&zero, TaskKind::Active).is_none());
    }

    #[test]
    fn test_identity_fallback_columns() {
        let active = json!({"task_id": "t-9"});
        assert_eq!(
            sanitize_record(&active, TaskKind::Active).unwrap().id,
            "t-9"
        );
        let historic = json!({"historic_task_id": 12});
        assert_eq!(
            sanitize_record(&historic, TaskKind::Historical).unwrap().id,
            "12"
        );
    }

    #[test]
    fn test_defaults_for_id_only_active_record() {
        let record = sanitize_record(&json!({"id": 1}), TaskKind::Active).unwrap();
        assert_eq!(record.title, DEFAULT_TITLE);
        assert_eq!(record.description, DEFAULT_DESCRIPTION);
        assert_eq!(record.status, DEFAULT_STATUS);
        assert_eq!(record.priority, DEFAULT_PRIORITY);
        assert_eq!(record.due_date, DEFAULT_DUE_DATE);
        assert_eq!(record.created_at, DEFAULT_CREATED_AT);
        assert_eq!(record.completion_date, None);
        assert_eq!(record.kind, TaskKind::Active);
    }

    #[test]
    fn test_historical_record_defaults_status() {
        let raw = json!({"id": "h1", "completion_date": "2023-01-02"});
        let record = sanitize_record(&raw, TaskKind::Historical).unwrap();
        assert_eq!(record.status, DEFAULT_STATUS);
        assert_eq!(record.completion_date.as_deref(), Some("2023-01-02"));
    }

    #[test]
    fn test_defaults_apply_per_field() {
        let raw = json!({"id": 3, "title": "Write report", "priority": 5, "due_date": ""});
        let record = sanitize_record(&raw, TaskKind::Active).unwrap();
        assert_eq!(record.title, "Write report");
        assert_eq!(record.priority, DEFAULT_PRIORITY);
        assert_eq!(record.due_date, DEFAULT_DUE_DATE);
        assert_eq!(record.description, DEFAULT_DESCRIPTION);
    }

    #[test]
    fn test_angle_brackets_stripped() {
        let raw = json!({"id": 1, "title": "<script>alert(1)</script>"});
        let record = sanitize_record(&raw, TaskKind::Active).unwrap();
        assert_eq!(record.title, "scriptalert(1)/script");
    }

    #[test]
    fn test_only_brackets_falls_back_to_default() {
        let raw = json!({"id": 1, "title": "<<>>"});
        let record = sanitize_record(&raw, TaskKind::Active).unwrap();
        assert_eq!(record.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_truncation_counts_characters() {
        let long: String = "é".repeat(MAX_FIELD_CHARS + 50);
        let raw = json!({"id": 1, "description": long});
        let record = sanitize_record(&raw, TaskKind::Active).unwrap();
        assert_eq!(record.description.chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_truncation_happens_before_stripping() {
        let mut text = "a".repeat(MAX_FIELD_CHARS - 1);
        text.push_str("<b");
        let raw = json!({"id": 1, "description": text});
        let record = sanitize_record(&raw, TaskKind::Active).unwrap();
        assert_eq!(record.description.len(), MAX_FIELD_CHARS - 1);
        assert!(!record.description.contains('b'));
    }

    #[test]
    fn test_task_record_dispatches_on_kind() {
        let record = TaskRecord::Historical(json!({"id": "2", "title": "Done"}));
        let canonical = record.sanitize().unwrap();
        assert_eq!(canonical.kind, TaskKind::Historical);
        assert_eq!(canonical.title, "Done");
    }
}
