use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use claude_mem_import_core::{ImportError, ObservationRecord, SessionSummaryRecord};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, OpenFlags, Row};
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const LIST_OBSERVATIONS_SQL: &str = r"
SELECT id, memory_session_id, project, text, type, title, created_at
FROM observations
WHERE text IS NOT NULL AND text != ''
ORDER BY created_at ASC
";

const LIST_SESSION_SUMMARIES_SQL: &str = r"
SELECT id, memory_session_id, project, request, investigated, learned,
       completed, next_steps, notes, created_at
FROM session_summaries
ORDER BY created_at ASC
";

/// Read-only handle on a claude-mem database.
pub struct SourceStore {
    conn: Connection,
    path: PathBuf,
}

impl SourceStore {
    /// Open the claude-mem database without write or create access.
    ///
    /// The file is probed immediately so a missing, unreadable or non-SQLite
    /// file fails here rather than on the first query.
    ///
    /// # Errors
    /// Returns [`ImportError::SourceUnavailable`] when the database cannot be opened or read.
    pub fn open(path: &Path) -> Result<Self> {
        let unavailable = |err: rusqlite::Error| ImportError::SourceUnavailable {
            path: path.display().to_string(),
            message: err.to_string(),
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(unavailable)?;

        conn.busy_timeout(BUSY_TIMEOUT).context("failed to configure sqlite busy timeout")?;
        conn.execute_batch("PRAGMA query_only = ON;")
            .context("failed to configure sqlite pragmas")?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(unavailable)?;

        debug!(path = %path.display(), "opened source store read-only");
        Ok(Self { conn, path: path.to_path_buf() })
    }

    /// Observations with non-empty text, oldest first.
    ///
    /// # Errors
    /// Returns an error when the query fails or a row cannot be decoded.
    pub fn list_observations(&self) -> Result<Vec<ObservationRecord>> {
        let mut stmt = self
            .conn
            .prepare(LIST_OBSERVATIONS_SQL)
            .context("failed to prepare observations query")?;
        let rows = stmt.query_map([], observation_from_row)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to read observations")
    }

    /// All session summaries, oldest first. Rows are not filtered for content.
    ///
    /// # Errors
    /// Returns an error when the query fails or a row cannot be decoded.
    pub fn list_session_summaries(&self) -> Result<Vec<SessionSummaryRecord>> {
        let mut stmt = self
            .conn
            .prepare(LIST_SESSION_SUMMARIES_SQL)
            .context("failed to prepare session summaries query")?;
        let rows = stmt.query_map([], session_summary_from_row)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().context("failed to read session summaries")
    }

    /// Release the connection, surfacing any error reported by `SQLite` on close.
    ///
    /// # Errors
    /// Returns an error when `SQLite` refuses to close the connection.
    pub fn close(self) -> Result<()> {
        let Self { conn, path } = self;
        conn.close()
            .map_err(|(_conn, err)| anyhow!(err))
            .with_context(|| format!("failed to close source store at {}", path.display()))?;
        debug!(path = %path.display(), "closed source store");
        Ok(())
    }
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<ObservationRecord> {
    Ok(ObservationRecord {
        id: row.get(0)?,
        memory_session_id: text_column(row, 1)?,
        project: text_column(row, 2)?,
        text: required_text_column(row, 3)?,
        observation_type: required_text_column(row, 4)?,
        title: text_column(row, 5)?,
        created_at: text_column(row, 6)?,
    })
}

fn session_summary_from_row(row: &Row<'_>) -> rusqlite::Result<SessionSummaryRecord> {
    Ok(SessionSummaryRecord {
        id: row.get(0)?,
        memory_session_id: text_column(row, 1)?,
        project: text_column(row, 2)?,
        request: text_column(row, 3)?,
        investigated: text_column(row, 4)?,
        learned: text_column(row, 5)?,
        completed: text_column(row, 6)?,
        next_steps: text_column(row, 7)?,
        notes: text_column(row, 8)?,
        created_at: text_column(row, 9)?,
    })
}

/// Read a column as text. Invalid UTF-8 is replaced rather than failing the
/// whole query, and numeric values are rendered as their decimal form.
fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
    })
}

fn required_text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    text_column(row, idx)?.ok_or_else(|| {
        let name = row.as_ref().column_name(idx).map_or_else(|_| idx.to_string(), str::to_string);
        rusqlite::Error::InvalidColumnType(idx, name, Type::Null)
    })
}
