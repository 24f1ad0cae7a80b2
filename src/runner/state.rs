use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Why a notebook failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// A cell exceeded the configured timeout
    Timeout,
    /// A cell raised, or the tool exited non-zero for another reason
    ExecutionError,
    /// The tool could not be started at all
    ToolInvocation,
    /// The child was killed by a signal or the user hit Ctrl-C
    Interrupted,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::ExecutionError => "ERROR",
            FailureKind::ToolInvocation => "TOOL ERROR",
            FailureKind::Interrupted => "INTERRUPTED",
        }
    }
}

/// Notebook execution status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotebookStatus {
    Passed,
    Failed { kind: FailureKind, message: String },
}

impl NotebookStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, NotebookStatus::Passed)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            NotebookStatus::Passed => None,
            NotebookStatus::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Outcome of one notebook run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub path: String,
    pub status: NotebookStatus,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: String,
}

impl ExecutionResult {
    pub fn is_passed(&self) -> bool {
        self.status.is_passed()
    }
}

/// Aggregate over one sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub timed_out: u32,
    #[serde(default)]
    pub execution_errors: u32,
    #[serde(default)]
    pub tool_errors: u32,
    pub interrupted: u32,
    /// Sum of per-notebook durations
    pub total_duration_ms: u64,
    /// Wall clock of the whole sweep
    pub wall_clock_ms: Option<u64>,
    pub skipped: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Results accumulated by the harness during one invocation
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub results: Vec<ExecutionResult>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub skipped: bool,
}

impl SessionState {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            results: Vec::new(),
            started_at: None,
            finished_at: None,
            skipped: false,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn record(&mut self, result: ExecutionResult) {
        self.results.push(result);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| !r.is_passed())
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            session_id: self.session_id.clone(),
            skipped: self.skipped,
            ..RunSummary::default()
        };

        for result in &self.results {
            summary.total += 1;
            summary.total_duration_ms += result.duration_ms;
            match result.status.failure_kind() {
                None => summary.passed += 1,
                Some(kind) => {
                    summary.failed += 1;
                    match kind {
                        FailureKind::Timeout => summary.timed_out += 1,
                        FailureKind::ExecutionError => summary.execution_errors += 1,
                        FailureKind::ToolInvocation => summary.tool_errors += 1,
                        FailureKind::Interrupted => summary.interrupted += 1,
                    }
                }
            }
        }

        summary.wall_clock_ms = self.started_at.map(|start| {
            self.finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(start)
                .as_millis() as u64
        });

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str, status: NotebookStatus, duration_ms: u64) -> ExecutionResult {
        ExecutionResult {
            path: path.to_string(),
            status,
            duration_ms,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            started_at: String::new(),
        }
    }

    #[test]
    fn test_summary_counts_failure_kinds() {
        let mut session = SessionState::new("s1");
        session.record(result("a.ipynb", NotebookStatus::Passed, 100));
        session.record(result(
            "b.ipynb",
            NotebookStatus::Failed {
                kind: FailureKind::Timeout,
                message: "cell timed out".into(),
            },
            600,
        ));
        session.record(result(
            "c.ipynb",
            NotebookStatus::Failed {
                kind: FailureKind::ExecutionError,
                message: "exit 1".into(),
            },
            50,
        ));
        session.record(result(
            "d.ipynb",
            NotebookStatus::Failed {
                kind: FailureKind::ToolInvocation,
                message: "not found".into(),
            },
            0,
        ));

        let summary = session.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.execution_errors, 1);
        assert_eq!(summary.tool_errors, 1);
        assert_eq!(summary.interrupted, 0);
        assert_eq!(summary.total_duration_ms, 750);
        assert_eq!(summary.wall_clock_ms, None);
        assert!(!summary.is_success());
        assert_eq!(session.failures().count(), 3);
    }

    #[test]
    fn test_status_serializes_tagged() {
        let status = NotebookStatus::Failed {
            kind: FailureKind::ToolInvocation,
            message: "not found".into(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"type":"failed","kind":"toolInvocation","message":"not found"}"#
        );
    }
}
