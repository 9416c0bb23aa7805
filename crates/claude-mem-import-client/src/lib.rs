use std::time::Duration;

use claude_mem_import_core::{MemoryPayload, MemorySink, SubmitOutcome};
use tracing::debug;

pub const MEMORY_ADD_PATH: &str = "/memory/add";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("claude-mem-import/", env!("CARGO_PKG_VERSION"));

/// `<base_url>/memory/add`, tolerating a trailing slash on the base.
#[must_use]
pub fn memory_add_endpoint(base_url: &str) -> String {
    format!("{}{MEMORY_ADD_PATH}", base_url.trim_end_matches('/'))
}

/// Map an HTTP status from a completed exchange to an outcome.
#[must_use]
pub fn classify_status(status: u16) -> SubmitOutcome {
    if (200..300).contains(&status) {
        SubmitOutcome::Accepted
    } else {
        SubmitOutcome::Rejected { status }
    }
}

/// Blocking client for the OpenMemory `memory/add` operation.
#[derive(Debug, Clone)]
pub struct OpenMemoryClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl OpenMemoryClient {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).user_agent(USER_AGENT).build();
        Self { agent, endpoint: memory_add_endpoint(base_url) }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MemorySink for OpenMemoryClient {
    fn submit(&self, payload: &MemoryPayload) -> SubmitOutcome {
        match self.agent.post(&self.endpoint).send_json(payload) {
            Ok(response) => classify_status(response.status()),
            Err(ureq::Error::Status(status, _response)) => {
                // Body is not inspected; it may echo the submitted content.
                debug!(endpoint = %self.endpoint, status, "memory service rejected payload");
                SubmitOutcome::Rejected { status }
            }
            Err(ureq::Error::Transport(transport)) => {
                debug!(endpoint = %self.endpoint, error = %transport, "memory service unreachable");
                SubmitOutcome::TransportFailed { reason: transport.to_string() }
            }
        }
    }
}
