#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde_json::Value;
use ulid::Ulid;

/// Observations and summaries in the standard fixture that produce a payload.
pub const ELIGIBLE_RECORDS: u64 = 4;

const SOURCE_SCHEMA_SQL: &str = r"
CREATE TABLE observations (
  id INTEGER PRIMARY KEY,
  memory_session_id TEXT,
  project TEXT,
  text TEXT,
  type TEXT NOT NULL,
  title TEXT,
  created_at TEXT
);

CREATE TABLE session_summaries (
  id INTEGER PRIMARY KEY,
  memory_session_id TEXT,
  project TEXT,
  request TEXT,
  investigated TEXT,
  learned TEXT,
  completed TEXT,
  next_steps TEXT,
  notes TEXT,
  created_at TEXT
);
";

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Ulid::new()));
    fs::create_dir_all(&dir)
        .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
    dir
}

pub fn insert_observation(
    conn: &Connection,
    id: i64,
    observation_type: &str,
    title: Option<&str>,
    text: Option<&str>,
    project: Option<&str>,
    created_at: &str,
) {
    conn.execute(
        "INSERT INTO observations(id, memory_session_id, project, text, type, title, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, format!("session-{id}"), project, text, observation_type, title, created_at],
    )
    .unwrap_or_else(|err| panic!("failed to insert observation {id}: {err}"));
}

/// `fields` are request, investigated, learned, completed, next_steps, notes.
pub fn insert_summary(
    conn: &Connection,
    id: i64,
    project: Option<&str>,
    fields: [Option<&str>; 6],
    created_at: &str,
) {
    let [request, investigated, learned, completed, next_steps, notes] = fields;
    conn.execute(
        "INSERT INTO session_summaries(
            id, memory_session_id, project, request, investigated, learned,
            completed, next_steps, notes, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            format!("session-{id}"),
            project,
            request,
            investigated,
            learned,
            completed,
            next_steps,
            notes,
            created_at,
        ],
    )
    .unwrap_or_else(|err| panic!("failed to insert session summary {id}: {err}"));
}

pub fn create_empty_source_db(dir: &Path) -> (PathBuf, Connection) {
    let path = dir.join("claude-mem.db");
    let conn = Connection::open(&path)
        .unwrap_or_else(|err| panic!("failed to create fixture db {}: {err}", path.display()));
    conn.execute_batch(SOURCE_SCHEMA_SQL)
        .unwrap_or_else(|err| panic!("failed to apply fixture schema: {err}"));
    (path, conn)
}

/// Two eligible observations (ids 2 then 1 by time), two excluded ones, two
/// summaries with content (ids 12 then 10 by time) and one empty summary.
pub fn create_standard_source_db(dir: &Path) -> PathBuf {
    let (path, conn) = create_empty_source_db(dir);

    insert_observation(
        &conn,
        1,
        "bug",
        Some("Null check"),
        Some("Added guard"),
        Some("/home/u/app"),
        "2025-01-02T00:00:00Z",
    );
    insert_observation(
        &conn,
        2,
        "feature",
        None,
        Some("Wired up importer"),
        None,
        "2025-01-01T00:00:00Z",
    );
    insert_observation(&conn, 3, "bug", None, Some(""), None, "2025-01-01T06:00:00Z");
    insert_observation(&conn, 4, "note", Some("orphan"), None, None, "2025-01-01T07:00:00Z");

    insert_summary(
        &conn,
        10,
        None,
        [Some("Fix crash"), None, None, Some("Done"), None, None],
        "2025-01-03T00:00:00Z",
    );
    insert_summary(
        &conn,
        11,
        Some("/home/u/app"),
        [Some(""), None, None, None, None, None],
        "2025-01-04T00:00:00Z",
    );
    insert_summary(
        &conn,
        12,
        Some("/srv/tools/cli/"),
        [None, None, Some("Use WAL"), None, None, None],
        "2025-01-02T12:00:00Z",
    );

    path
}

#[derive(Clone, Default)]
struct MockState {
    received: Arc<Mutex<Vec<Value>>>,
    statuses: Arc<Mutex<VecDeque<u16>>>,
}

/// In-process stand-in for the memory service's `POST /memory/add`.
pub struct MockMemoryService {
    pub base_url: String,
    state: MockState,
}

impl MockMemoryService {
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

async fn memory_add(State(state): State<MockState>, Json(body): Json<Value>) -> StatusCode {
    state.received.lock().unwrap_or_else(PoisonError::into_inner).push(body);
    let status =
        state.statuses.lock().unwrap_or_else(PoisonError::into_inner).pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Start a mock service that answers with `statuses` in order, then 200.
pub fn spawn_memory_service(statuses: &[u16]) -> MockMemoryService {
    let state = MockState {
        received: Arc::default(),
        statuses: Arc::new(Mutex::new(statuses.iter().copied().collect())),
    };

    let listener = TcpListener::bind("127.0.0.1:0")
        .unwrap_or_else(|err| panic!("failed to bind mock service: {err}"));
    listener
        .set_nonblocking(true)
        .unwrap_or_else(|err| panic!("failed to configure mock listener: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("failed to read mock service address: {err}"));

    let app = Router::new().route("/memory/add", post(memory_add)).with_state(state.clone());
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|err| panic!("failed to build mock runtime: {err}"));
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener)
                .unwrap_or_else(|err| panic!("failed to adopt mock listener: {err}"));
            if let Err(err) = axum::serve(listener, app).await {
                panic!("mock memory service stopped: {err}");
            }
        });
    });

    MockMemoryService { base_url: format!("http://{addr}"), state }
}

/// Base URL for a local port with nothing listening on it.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .unwrap_or_else(|err| panic!("failed to bind ephemeral port: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("failed to read ephemeral address: {err}"));
    drop(listener);
    format!("http://{addr}")
}

/// Marker line written after the two `Found ...` header lines.
pub fn marker_line(output: &[u8]) -> String {
    let text = String::from_utf8_lossy(output);
    text.lines().nth(2).unwrap_or_default().to_string()
}
