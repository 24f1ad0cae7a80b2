use crate::error::HarnessError;
use crate::utils::binary_resolver;
use crate::utils::config::Config;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command;

use super::state::{FailureKind, NotebookStatus};

/// What the execution tool left behind
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs a single notebook to completion
#[async_trait]
pub trait NotebookExecutor: Send + Sync {
    /// Check that the tool is usable before the sweep starts
    async fn preflight(&mut self) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Human-readable command line, for logs
    fn describe(&self, notebook: &Path) -> String {
        notebook.display().to_string()
    }

    /// Execute `notebook`. `Err` means the tool could not be started.
    async fn execute(&self, notebook: &Path) -> std::io::Result<ToolOutput>;
}

/// `python -m jupyter nbconvert --execute` executor
pub struct NbconvertExecutor {
    python: String,
    resolved: Option<PathBuf>,
    output_format: String,
    timeout_secs: u64,
    working_dir: PathBuf,
}

impl NbconvertExecutor {
    pub fn new(config: &Config) -> Self {
        Self {
            python: config.python.clone(),
            resolved: None,
            output_format: config.output_format.clone(),
            timeout_secs: config.timeout_secs,
            working_dir: config.root.clone(),
        }
    }

    pub fn args(&self, notebook: &Path) -> Vec<String> {
        vec![
            "-m".to_string(),
            "jupyter".to_string(),
            "nbconvert".to_string(),
            "--to".to_string(),
            self.output_format.clone(),
            "--execute".to_string(),
            format!("--ExecutePreprocessor.timeout={}", self.timeout_secs),
            notebook.display().to_string(),
        ]
    }

    fn program(&self) -> PathBuf {
        self.resolved
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.python))
    }
}

#[async_trait]
impl NotebookExecutor for NbconvertExecutor {
    async fn preflight(&mut self) -> Result<(), HarnessError> {
        let path = binary_resolver::find_python(&self.python)?;
        log::debug!("Using interpreter {}", path.display());

        // The interpreter alone is not enough: nbconvert must be importable
        let version_check = Command::new(&path)
            .args(["-m", "jupyter", "nbconvert", "--version"])
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HarnessError::ToolUnusable {
                tool: path.display().to_string(),
                detail: e.to_string(),
            })?;

        if !version_check.status.success() {
            let stderr = String::from_utf8_lossy(&version_check.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| format!("exited with {}", version_check.status));
            return Err(HarnessError::ToolUnusable {
                tool: format!("{} -m jupyter nbconvert", path.display()),
                detail,
            });
        }

        log::debug!(
            "nbconvert {}",
            String::from_utf8_lossy(&version_check.stdout).trim()
        );
        self.resolved = Some(path);
        Ok(())
    }

    fn describe(&self, notebook: &Path) -> String {
        let mut parts = vec![self.program().display().to_string()];
        parts.extend(self.args(notebook));
        parts.join(" ")
    }

    async fn execute(&self, notebook: &Path) -> std::io::Result<ToolOutput> {
        let start = Instant::now();
        let output = Command::new(self.program())
            .args(self.args(notebook))
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: start.elapsed(),
        })
    }
}

fn timeout_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)CellTimeoutError|cell execution timed out|timeout waiting for (execute reply|iopub)")
            .expect("timeout pattern is valid")
    })
}

/// Map a finished tool run to a notebook status
pub fn classify(output: &ToolOutput, interrupted: bool) -> NotebookStatus {
    if interrupted {
        return NotebookStatus::Failed {
            kind: FailureKind::Interrupted,
            message: "execution interrupted".to_string(),
        };
    }

    match output.exit_code {
        Some(0) => NotebookStatus::Passed,
        Some(code) if timeout_pattern().is_match(&output.stderr) => NotebookStatus::Failed {
            kind: FailureKind::Timeout,
            message: format!("cell execution timed out (exit code {})", code),
        },
        Some(code) => NotebookStatus::Failed {
            kind: FailureKind::ExecutionError,
            message: format!("execution tool exited with code {}", code),
        },
        None => NotebookStatus::Failed {
            kind: FailureKind::Interrupted,
            message: "execution tool was terminated by a signal".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, stderr: &str) -> ToolOutput {
        ToolOutput {
            exit_code: code,
            stderr: stderr.to_string(),
            ..ToolOutput::default()
        }
    }

    #[test]
    fn test_args_pass_timeout_and_format() {
        let config = Config {
            timeout_secs: 42,
            ..Config::default()
        };
        let executor = NbconvertExecutor::new(&config);
        let args = executor.args(Path::new("intro/hello.ipynb"));
        assert_eq!(
            args,
            vec![
                "-m",
                "jupyter",
                "nbconvert",
                "--to",
                "html",
                "--execute",
                "--ExecutePreprocessor.timeout=42",
                "intro/hello.ipynb",
            ]
        );
        assert!(executor
            .describe(Path::new("intro/hello.ipynb"))
            .starts_with("python3 -m jupyter nbconvert"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&output(Some(0), ""), false), NotebookStatus::Passed);

        let timeout = classify(
            &output(
                Some(1),
                "nbclient.exceptions.CellTimeoutError: A cell timed out while it was being executed",
            ),
            false,
        );
        assert_eq!(timeout.failure_kind(), Some(FailureKind::Timeout));

        let error = classify(&output(Some(1), "ZeroDivisionError: division by zero"), false);
        assert_eq!(error.failure_kind(), Some(FailureKind::ExecutionError));

        let killed = classify(&output(None, ""), false);
        assert_eq!(killed.failure_kind(), Some(FailureKind::Interrupted));

        let interrupted = classify(&output(Some(0), ""), true);
        assert_eq!(interrupted.failure_kind(), Some(FailureKind::Interrupted));
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_preflight() {
        let config = Config {
            python: "no-such-python-for-nb-tester".to_string(),
            ..Config::default()
        };
        let mut executor = NbconvertExecutor::new(&config);
        assert!(matches!(
            executor.preflight().await,
            Err(HarnessError::ToolNotFound { .. })
        ));

        // Spawning without preflight surfaces as an io error, not a panic
        assert!(executor.execute(Path::new("a.ipynb")).await.is_err());
    }

    /// Write an executable shell script standing in for the interpreter
    #[cfg(unix)]
    fn stub_interpreter(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-python");
        std::fs::write(&script, format!("#!/bin/sh\n{}", body)).unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stub_interpreter_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = stub_interpreter(
            dir.path(),
            "for last; do :; done\n\
             echo \"converting $last\"\n\
             case \"$last\" in\n\
               *bad.ipynb) echo 'cell error' >&2; exit 1 ;;\n\
             esac\n\
             exit 0\n",
        );

        let config = Config {
            root: dir.path().to_path_buf(),
            python: script.display().to_string(),
            ..Config::default()
        };
        let mut executor = NbconvertExecutor::new(&config);
        executor.preflight().await.unwrap();

        let good = executor.execute(Path::new("good.ipynb")).await.unwrap();
        assert_eq!(good.exit_code, Some(0));
        assert!(good.stdout.contains("converting good.ipynb"));

        let bad = executor.execute(Path::new("bad.ipynb")).await.unwrap();
        assert_eq!(bad.exit_code, Some(1));
        assert!(bad.stderr.contains("cell error"));
        assert_eq!(
            classify(&bad, false).failure_kind(),
            Some(FailureKind::ExecutionError)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interpreter_without_nbconvert_fails_preflight() {
        let dir = tempfile::tempdir().unwrap();
        let script = stub_interpreter(
            dir.path(),
            "echo '/usr/bin/python3: No module named jupyter' >&2\nexit 1\n",
        );

        let config = Config {
            root: dir.path().to_path_buf(),
            python: script.display().to_string(),
            ..Config::default()
        };
        let mut executor = NbconvertExecutor::new(&config);

        let err = executor.preflight().await.unwrap_err();
        assert!(err.is_setup_error());
        assert_eq!(err.exit_code(), crate::error::EXIT_SETUP_ERROR);
        match err {
            HarnessError::ToolUnusable { detail, .. } => {
                assert!(detail.contains("No module named jupyter"), "{}", detail);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
