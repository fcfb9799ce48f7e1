//! Context assembler.
//!
//! Renders ranked [`CanonicalRecord`]s into the numbered text block that is
//! embedded in the completion prompt:
//!
//! ```text
//! (1) [ONGOING_TASK] Title: Ongoing
//! Description: OngoingDesc
//! Status: unknown
//! Priority: high
//! Due Date: 2024-01-01
//! Created At: 2024-01-01
//!
//! (2) [PAST_COMPLETED_TASK] Title: Completed
//! ...
//! Completion Date: 2023-01-02
//! ```

use crate::models::CanonicalRecord;

/// Render one record as a numbered block; `position` is 1-based.
pub fn render_record(position: usize, record: &CanonicalRecord) -> String {
    let fields: [(&str, Option<&str>); 7] = [
        ("Title", Some(record.title.as_str())),
        ("Description", Some(record.description.as_str())),
        ("Status", Some(record.status.as_str())),
        ("Priority", Some(record.priority.as_str())),
        ("Due Date", Some(record.due_date.as_str())),
        ("Created At", Some(record.created_at.as_str())),
        ("Completion Date", record.completion_date.as_deref()),
    ];

    let mut lines = fields
        .iter()
        .filter_map(|(label, value)| match value {
            Some(v) if !v.is_empty() => Some(format!("{}: {}", label, v)),
            _ => None,
        })
        .collect::<Vec<_>>();

    let header = format!("({}) [{}]", position, record.kind.context_label());
    match lines.first_mut() {
        Some(first) => *first = format!("{} {}", header, first),
        None => lines.push(header),
    }
    lines.join("\n")
}

/// Assemble the context block, or `None` when there is nothing to render.
pub fn assemble(records: &[CanonicalRecord]) -> Option<String> {
    if records.is_empty() {
        return None;
    }

    Some(
        records
            .iter()
            .enumerate()
            .map(|(i, record)| render_record(i + 1, record))
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}
