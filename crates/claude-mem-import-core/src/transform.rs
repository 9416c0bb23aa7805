use serde_json::{Map, Value};

use crate::{
    MemoryPayload, ObservationRecord, SessionSummaryRecord, IMPORT_USER_ID, OBSERVATION_TAG,
    SESSION_SUMMARY_TAG, SESSION_SUMMARY_TYPE, SOURCE_TAG,
};

const SESSION_SUMMARY_HEADER: &str = "[SESSION SUMMARY]";

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Final segment of a project path.
///
/// Both `/` and `\` are treated as separators so a path recorded on another
/// platform still collapses to its last component. Trailing separators are
/// ignored; a path with no named segment yields `None`.
#[must_use]
pub fn project_basename(project: &str) -> Option<&str> {
    project
        .trim_end_matches(is_separator)
        .rsplit(is_separator)
        .next()
        .filter(|segment| !segment.is_empty())
}

/// `project:<basename>` tag, or `None` when the row has no usable project path.
#[must_use]
pub fn project_tag(project: Option<&str>) -> Option<String> {
    project.and_then(project_basename).map(|name| format!("project:{name}"))
}

/// Normalize an observation row into a memory payload.
#[must_use]
pub fn transform_observation(row: &ObservationRecord) -> MemoryPayload {
    let label = row.observation_type.to_uppercase();
    let content = match row.title.as_deref().filter(|title| !title.is_empty()) {
        Some(title) => format!("[{label}] {title}\n\n{}", row.text),
        None => format!("[{label}] {}", row.text),
    };

    let mut tags =
        vec![row.observation_type.clone(), SOURCE_TAG.to_string(), OBSERVATION_TAG.to_string()];
    tags.extend(project_tag(row.project.as_deref()));

    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::from(SOURCE_TAG));
    metadata.insert("original_id".to_string(), Value::from(row.id));
    metadata.insert("type".to_string(), Value::from(row.observation_type.as_str()));
    metadata.insert("project".to_string(), Value::from(row.project.clone()));
    metadata.insert("session_id".to_string(), Value::from(row.memory_session_id.clone()));
    metadata.insert("created_at".to_string(), Value::from(row.created_at.clone()));

    MemoryPayload { content, user_id: IMPORT_USER_ID.to_string(), tags, metadata }
}

/// Normalize a session summary row, or `None` when none of its six text fields
/// carry content.
#[must_use]
pub fn transform_session_summary(row: &SessionSummaryRecord) -> Option<MemoryPayload> {
    let sections = row.sections();
    if sections.is_empty() {
        return None;
    }

    let body = sections
        .iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    let content = format!("{SESSION_SUMMARY_HEADER}\n\n{body}");

    let mut tags = vec![SESSION_SUMMARY_TAG.to_string(), SOURCE_TAG.to_string()];
    tags.extend(project_tag(row.project.as_deref()));

    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::from(SOURCE_TAG));
    metadata.insert("type".to_string(), Value::from(SESSION_SUMMARY_TYPE));
    metadata.insert("original_id".to_string(), Value::from(row.id));
    metadata.insert("project".to_string(), Value::from(row.project.clone()));
    metadata.insert("session_id".to_string(), Value::from(row.memory_session_id.clone()));
    metadata.insert("created_at".to_string(), Value::from(row.created_at.clone()));

    Some(MemoryPayload { content, user_id: IMPORT_USER_ID.to_string(), tags, metadata })
}
