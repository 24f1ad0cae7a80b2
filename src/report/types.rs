use crate::runner::state::{ExecutionResult, RunSummary, SessionState};
use serde::{Deserialize, Serialize};

/// Test results for report generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub session_id: String,
    pub results: Vec<ExecutionResult>,
    pub summary: RunSummary,
    pub generated_at: String,
}

impl TestResults {
    pub fn from_session(session: &SessionState) -> Self {
        Self {
            session_id: session.session_id.clone(),
            results: session.results.clone(),
            summary: session.summary(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
