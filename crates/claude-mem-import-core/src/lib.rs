use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::{Map, Value};

mod transform;

pub use transform::{project_basename, project_tag, transform_observation, transform_session_summary};

/// `user_id` attached to every payload submitted by this importer.
pub const IMPORT_USER_ID: &str = "claude-mem-import";
/// Provenance tag and `metadata.source` value.
pub const SOURCE_TAG: &str = "claude-mem";
pub const OBSERVATION_TAG: &str = "observation";
pub const SESSION_SUMMARY_TAG: &str = "session-summary";
pub const SESSION_SUMMARY_TYPE: &str = "session_summary";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ImportError {
    #[error("source store unavailable at {path}: {message}")]
    SourceUnavailable { path: String, message: String },
    #[error("could not resolve the home directory for the default source store")]
    MissingHomeDir,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RecordKind {
    Observation,
    SessionSummary,
}

impl RecordKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::SessionSummary => "session_summary",
        }
    }
}

/// One row of the `observations` relation.
///
/// Only `text` and `type` are required; the remaining columns pass through as
/// `null` when the row leaves them empty.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ObservationRecord {
    pub id: i64,
    pub memory_session_id: Option<String>,
    pub project: Option<String>,
    pub text: String,
    pub observation_type: String,
    pub title: Option<String>,
    pub created_at: Option<String>,
}

/// One row of the `session_summaries` relation.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SessionSummaryRecord {
    pub id: i64,
    pub memory_session_id: Option<String>,
    pub project: Option<String>,
    pub request: Option<String>,
    pub investigated: Option<String>,
    pub learned: Option<String>,
    pub completed: Option<String>,
    pub next_steps: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
}

impl SessionSummaryRecord {
    /// Labeled free-text fields in display order. Absent and empty values are dropped.
    #[must_use]
    pub fn sections(&self) -> Vec<(&'static str, &str)> {
        [
            ("Request", &self.request),
            ("Investigated", &self.investigated),
            ("Learned", &self.learned),
            ("Completed", &self.completed),
            ("Next Steps", &self.next_steps),
            ("Notes", &self.notes),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value.as_deref().filter(|value| !value.is_empty()).map(|value| (label, value))
        })
        .collect()
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.sections().is_empty()
    }
}

/// Request body for `POST /memory/add`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MemoryPayload {
    pub content: String,
    pub user_id: String,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
}

/// Result of submitting a single payload to the memory service.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SubmitOutcome {
    Accepted,
    /// The service answered with a non-success status.
    Rejected { status: u16 },
    /// The request never produced a usable response.
    TransportFailed { reason: String },
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl Display for SubmitOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected { status } => write!(f, "rejected with HTTP {status}"),
            Self::TransportFailed { reason } => write!(f, "transport failed: {reason}"),
        }
    }
}

/// Destination for transformed payloads.
pub trait MemorySink {
    fn submit(&self, payload: &MemoryPayload) -> SubmitOutcome;
}

/// Running count of submissions for one import run.
///
/// `skipped` tracks session summaries that had nothing to submit and never
/// participates in `imported + failed`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ImportTally {
    pub imported: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl ImportTally {
    pub fn record(&mut self, outcome: &SubmitOutcome) {
        if outcome.is_accepted() {
            self.imported += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.imported + self.failed
    }
}

impl Display for ImportTally {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} imported, {} failed", self.imported, self.failed)
    }
}
