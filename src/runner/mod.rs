pub mod discovery;
pub mod events;
pub mod executor;
pub mod state;

use crate::credential;
use crate::error::HarnessError;
use crate::utils::config::Config;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub use discovery::NotebookDiscovery;
pub use events::*;
pub use executor::{classify, NbconvertExecutor, NotebookExecutor, ToolOutput};
pub use state::*;

/// Discovers, executes and summarises the notebooks under one root
pub struct NotebookHarness<E: NotebookExecutor> {
    config: Config,
    executor: E,
    emitter: EventEmitter,
    session: SessionState,
    stop: Arc<AtomicBool>,
}

impl<E: NotebookExecutor> NotebookHarness<E> {
    pub fn new(config: Config, executor: E) -> Self {
        Self {
            config,
            executor,
            emitter: EventEmitter::default(),
            session: SessionState::new(&Uuid::new_v4().to_string()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a stop flag, typically set from a Ctrl-C handler
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Subscribe to harness events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TestEvent> {
        self.emitter.subscribe()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whole invocation: skip gate, discovery, tool preflight, execution.
    ///
    /// Returns the summary when every notebook passed (or the sweep was
    /// skipped), `NotebooksFailed` otherwise.
    pub async fn run<F>(&mut self, env: F) -> Result<RunSummary, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential_configured =
            env(&self.config.credential_var).map_or(false, |v| !credential::is_blank(&v));

        self.emitter.emit(TestEvent::SessionStarted {
            session_id: self.session.session_id.clone(),
            timeout_secs: self.config.timeout_secs,
            credential_configured,
        });

        if self.config.should_skip(&env) {
            return Ok(self.skip());
        }

        let notebooks =
            NotebookDiscovery::new(&self.config.root, &self.config.exclude)?.discover()?;
        self.emitter.emit(TestEvent::NotebooksDiscovered {
            paths: notebooks.iter().map(|p| p.display().to_string()).collect(),
        });

        self.executor.preflight().await?;

        let summary = self.execute_all(&notebooks).await;
        verdict(summary)
    }

    /// Record a skipped session without touching the filesystem
    pub fn skip(&mut self) -> RunSummary {
        let reason = format!(
            "{} not set; skipping notebook execution tests that call IonQ's cloud APIs.",
            self.config.credential_var
        );
        log::warn!("{}", reason);
        self.emitter.emit(TestEvent::SessionSkipped { reason });

        self.session.skipped = true;
        self.session.finish();
        self.session.summary()
    }

    /// Execute `notebooks` in order, once each.
    ///
    /// Failures are recorded and the sweep continues unless `fail_fast` is
    /// set or the stop flag was raised. Notebooks left over by a stop are
    /// recorded as `Interrupted`, so a cut-short sweep never passes.
    pub async fn execute_all(&mut self, notebooks: &[PathBuf]) -> RunSummary {
        self.session.start();
        let total = notebooks.len();

        for (index, notebook) in notebooks.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                self.emitter.emit(TestEvent::Log {
                    message: format!(
                        "{} Interrupted, {} notebook(s) not attempted",
                        "⚠".yellow(),
                        total - index
                    ),
                });
                for remaining in &notebooks[index..] {
                    self.session.record(not_attempted(remaining));
                }
                break;
            }

            let result = self.execute_one(index, total, notebook).await;
            let passed = result.is_passed();
            self.session.record(result);

            if passed {
                continue;
            }
            if self.config.fail_fast {
                self.emitter.emit(TestEvent::Log {
                    message: format!("{} Fail-fast enabled, stopping sweep", "■".red()),
                });
                break;
            }
            if index + 1 < total && !self.stop.load(Ordering::SeqCst) {
                self.emitter.emit(TestEvent::Log {
                    message: "Continuing with remaining notebooks".to_string(),
                });
            }
        }

        self.session.finish();
        let summary = self.session.summary();

        self.emitter.emit(TestEvent::SessionFinished {
            summary: summary.clone(),
            results: self.session.results.clone(),
        });

        summary
    }

    async fn execute_one(
        &mut self,
        index: usize,
        total: usize,
        notebook: &Path,
    ) -> ExecutionResult {
        let path = notebook.display().to_string();
        self.emitter.emit(TestEvent::NotebookStarted {
            index,
            total,
            path: path.clone(),
            command: self.executor.describe(notebook),
        });

        let started_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let start = Instant::now();

        let (status, output) = match self.executor.execute(notebook).await {
            Ok(output) => {
                let interrupted = self.stop.load(Ordering::SeqCst);
                (classify(&output, interrupted), output)
            }
            Err(e) => {
                log::error!("Failed to start execution tool for {}: {}", path, e);
                let status = NotebookStatus::Failed {
                    kind: FailureKind::ToolInvocation,
                    message: format!("failed to start execution tool: {}", e),
                };
                let output = ToolOutput {
                    exit_code: None,
                    stderr: e.to_string(),
                    elapsed: start.elapsed(),
                    ..ToolOutput::default()
                };
                (status, output)
            }
        };

        let duration_ms = output.elapsed.as_millis() as u64;
        match &status {
            NotebookStatus::Passed => {
                log::debug!("{} passed in {}ms", path, duration_ms);
                self.emitter.emit(TestEvent::NotebookPassed {
                    path: path.clone(),
                    duration_ms,
                });
            }
            NotebookStatus::Failed { kind, message } => {
                log::debug!("{} failed after {}ms: {}", path, duration_ms, message);
                self.emitter.emit(TestEvent::NotebookFailed {
                    path: path.clone(),
                    kind: *kind,
                    message: message.clone(),
                    duration_ms,
                });
            }
        }

        ExecutionResult {
            path,
            status,
            duration_ms,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            started_at,
        }
    }
}

fn not_attempted(notebook: &Path) -> ExecutionResult {
    ExecutionResult {
        path: notebook.display().to_string(),
        status: NotebookStatus::Failed {
            kind: FailureKind::Interrupted,
            message: "not attempted: sweep interrupted".to_string(),
        },
        duration_ms: 0,
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        started_at: String::new(),
    }
}

/// Turn a finished sweep into the invocation outcome
pub fn verdict(summary: RunSummary) -> Result<RunSummary, HarnessError> {
    if summary.failed > 0 {
        return Err(HarnessError::NotebooksFailed {
            failed: summary.failed,
            total: summary.total,
        });
    }
    Ok(summary)
}

/// Run the real harness with console output and optional reports
pub async fn run_tests(config: Config, stop: Arc<AtomicBool>) -> Result<RunSummary, HarnessError> {
    let executor = NbconvertExecutor::new(&config);
    let report_dir = config.report.then(|| config.output_dir.clone());

    let mut harness = NotebookHarness::new(config, executor).with_stop_flag(stop);
    let listener = tokio::spawn(ConsoleEventListener::listen(harness.subscribe()));

    let outcome = harness.run(|name| std::env::var(name).ok()).await;

    if let Some(dir) = report_dir {
        let session = harness.session();
        if !session.skipped && !session.results.is_empty() {
            if let Err(e) = crate::report::write_session(session, &dir) {
                log::error!("Failed to write reports to {}: {:#}", dir.display(), e);
            }
        }
    }

    // Closing the channel lets the listener drain and exit
    drop(harness);
    if let Err(e) = listener.await {
        log::warn!("Console listener ended abnormally: {}", e);
    }

    outcome
}
