use std::path::PathBuf;
use thiserror::Error;

/// Exit code when every notebook passed or the sweep was skipped
pub const EXIT_OK: i32 = 0;
/// Exit code when at least one notebook failed
pub const EXIT_NOTEBOOKS_FAILED: i32 = 1;
/// Exit code when the harness could not start the sweep
pub const EXIT_SETUP_ERROR: i32 = 2;
/// Exit code when the credential could not be resolved
pub const EXIT_CREDENTIAL_ERROR: i32 = 3;

/// Errors that end a harness invocation
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no notebooks found under {}", .root.display())]
    NoNotebooks { root: PathBuf },

    #[error("notebook execution tool '{tool}' could not be found")]
    ToolNotFound {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error("notebook execution tool '{tool}' is not usable: {detail}")]
    ToolUnusable { tool: String, detail: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to walk {}", .root.display())]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{failed} notebook(s) failed to execute (out of {total})")]
    NotebooksFailed { failed: u32, total: u32 },
}

impl HarnessError {
    /// Setup errors stop the harness before any notebook can be blamed
    pub fn is_setup_error(&self) -> bool {
        !matches!(self, HarnessError::NotebooksFailed { .. })
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_setup_error() {
            EXIT_SETUP_ERROR
        } else {
            EXIT_NOTEBOOKS_FAILED
        }
    }
}

/// Errors from resolving the API credential
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(
        "credential unavailable: neither environment variable {variable} nor interactive input succeeded"
    )]
    Unavailable {
        variable: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl CredentialError {
    pub fn exit_code(&self) -> i32 {
        EXIT_CREDENTIAL_ERROR
    }
}
