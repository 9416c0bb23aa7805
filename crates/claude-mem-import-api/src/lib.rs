use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use claude_mem_import_client::{OpenMemoryClient, DEFAULT_TIMEOUT};
use claude_mem_import_core::{
    transform_observation, transform_session_summary, ImportError, ImportTally, MemoryPayload,
    MemorySink, RecordKind, SubmitOutcome,
};
use claude_mem_import_store_sqlite::SourceStore;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const CLAUDE_MEM_DIR: &str = ".claude-mem";
const CLAUDE_MEM_DB_FILE: &str = "claude-mem.db";

/// `~/.claude-mem/claude-mem.db`.
///
/// # Errors
/// Returns [`ImportError::MissingHomeDir`] when the home directory cannot be resolved.
pub fn default_source_db() -> Result<PathBuf, ImportError> {
    dirs::home_dir()
        .map(|home| home.join(CLAUDE_MEM_DIR).join(CLAUDE_MEM_DB_FILE))
        .ok_or(ImportError::MissingHomeDir)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub source_db: PathBuf,
    pub base_url: String,
    pub timeout: Duration,
    /// Transform and count records without contacting the memory service.
    pub dry_run: bool,
}

impl ImportConfig {
    #[must_use]
    pub fn new(source_db: PathBuf, base_url: impl Into<String>) -> Self {
        Self { source_db, base_url: base_url.into(), timeout: DEFAULT_TIMEOUT, dry_run: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub observations_found: usize,
    pub summaries_found: usize,
    pub tally: ImportTally,
}

/// Observer for per-record submission results.
pub trait ProgressSink {
    fn started(&mut self, _observations: usize, _summaries: usize) {}

    fn record(&mut self, kind: RecordKind, outcome: &SubmitOutcome);
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn record(&mut self, _kind: RecordKind, _outcome: &SubmitOutcome) {}
}

/// Single-character marker for a submission: `.` accepted observation,
/// `S` accepted summary, `x` any failure.
#[must_use]
pub fn progress_marker(kind: RecordKind, outcome: &SubmitOutcome) -> char {
    match (kind, outcome.is_accepted()) {
        (RecordKind::Observation, true) => '.',
        (RecordKind::SessionSummary, true) => 'S',
        (_, false) => 'x',
    }
}

/// Writes found counts and one marker per record, flushing after each marker.
#[derive(Debug)]
pub struct MarkerProgress<W: Write> {
    out: W,
}

impl<W: Write> MarkerProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for MarkerProgress<W> {
    fn started(&mut self, observations: usize, summaries: usize) {
        if let Err(err) = writeln!(
            self.out,
            "Found {observations} observations to import\nFound {summaries} session summaries to import"
        ) {
            debug!(error = %err, "failed to write progress header");
        }
    }

    fn record(&mut self, kind: RecordKind, outcome: &SubmitOutcome) {
        let marker = progress_marker(kind, outcome);
        if let Err(err) = write!(self.out, "{marker}").and_then(|()| self.out.flush()) {
            debug!(error = %err, "failed to write progress marker");
        }
    }
}

/// Accepts every payload without I/O. Backs dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSink;

impl MemorySink for DryRunSink {
    fn submit(&self, _payload: &MemoryPayload) -> SubmitOutcome {
        SubmitOutcome::Accepted
    }
}

#[derive(Debug, Clone)]
pub struct Importer {
    config: ImportConfig,
}

impl Importer {
    #[must_use]
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Open the source store and push every eligible record to the configured service.
    ///
    /// # Errors
    /// Returns an error when the source store cannot be opened, queried or closed.
    /// Submission failures are counted, never returned.
    pub fn run(&self, progress: &mut dyn ProgressSink) -> Result<ImportReport> {
        let store = SourceStore::open(&self.config.source_db)?;

        if self.config.dry_run {
            info!(source = %self.config.source_db.display(), "dry run; no requests will be sent");
            return import_records(store, &DryRunSink, progress);
        }

        let client = OpenMemoryClient::new(&self.config.base_url, self.config.timeout);
        info!(
            source = %self.config.source_db.display(),
            endpoint = client.endpoint(),
            "importing claude-mem records"
        );
        import_records(store, &client, progress)
    }
}

/// Transform and submit all observations, then all session summaries, one at a time.
///
/// The store is closed after the last record. If a query fails the store is
/// released when it is dropped on the error path.
///
/// # Errors
/// Returns an error when either query fails or the store cannot be closed.
pub fn import_records(
    store: SourceStore,
    sink: &dyn MemorySink,
    progress: &mut dyn ProgressSink,
) -> Result<ImportReport> {
    let observations = store.list_observations()?;
    let summaries = store.list_session_summaries()?;
    info!(
        observations = observations.len(),
        summaries = summaries.len(),
        "loaded source records"
    );
    progress.started(observations.len(), summaries.len());

    let mut tally = ImportTally::default();

    for row in &observations {
        let payload = transform_observation(row);
        submit_one(sink, progress, &mut tally, RecordKind::Observation, row.id, &payload);
    }

    for row in &summaries {
        let Some(payload) = transform_session_summary(row) else {
            debug!(original_id = row.id, "skipping session summary without content");
            tally.record_skipped();
            continue;
        };
        submit_one(sink, progress, &mut tally, RecordKind::SessionSummary, row.id, &payload);
    }

    store.close()?;

    if tally.failed > 0 {
        warn!(imported = tally.imported, failed = tally.failed, "import finished with failures");
    } else {
        info!(imported = tally.imported, skipped = tally.skipped, "import finished");
    }

    Ok(ImportReport {
        observations_found: observations.len(),
        summaries_found: summaries.len(),
        tally,
    })
}

fn submit_one(
    sink: &dyn MemorySink,
    progress: &mut dyn ProgressSink,
    tally: &mut ImportTally,
    kind: RecordKind,
    original_id: i64,
    payload: &MemoryPayload,
) {
    let outcome = sink.submit(payload);
    debug!(kind = kind.as_str(), original_id, %outcome, "submitted record");
    tally.record(&outcome);
    progress.record(kind, &outcome);
}
