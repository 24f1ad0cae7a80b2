use super::state::{ExecutionResult, FailureKind, RunSummary};
use tokio::sync::broadcast;

/// Width of the `====` banners around each section
pub const SEPARATOR_WIDTH: usize = 60;

/// Harness events for real-time console output
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Session events
    SessionStarted {
        session_id: String,
        timeout_secs: u64,
        credential_configured: bool,
    },
    SessionSkipped {
        reason: String,
    },
    NotebooksDiscovered {
        paths: Vec<String>,
    },
    SessionFinished {
        summary: RunSummary,
        results: Vec<ExecutionResult>,
    },

    // Notebook events
    NotebookStarted {
        index: usize,
        total: usize,
        path: String,
        command: String,
    },
    NotebookPassed {
        path: String,
        duration_ms: u64,
    },
    NotebookFailed {
        path: String,
        kind: FailureKind,
        message: String,
        duration_ms: u64,
    },

    Log {
        message: String,
    },
}

/// Event emitter for broadcasting harness events
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

fn seconds(ms: u64) -> String {
    format!("{:.2}s", ms as f64 / 1000.0)
}

fn print_section(title: &str) {
    let line = "=".repeat(SEPARATOR_WIDTH);
    println!("\n{}\n{}\n{}", line, title, line);
}

/// Console event listener for printing real-time updates.
/// Runs until every emitter is dropped.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let is_tty = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("Console output dropped {} events", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::SessionStarted {
                    session_id,
                    timeout_secs,
                    credential_configured,
                } => {
                    print_section("Notebook Integration Test Runner");
                    println!("  Session: {}", session_id.cyan());
                    println!("  Timeout per notebook: {}s", timeout_secs);
                    println!(
                        "  API key configured: {}",
                        if credential_configured {
                            "Yes".green()
                        } else {
                            "No".yellow()
                        }
                    );
                }

                TestEvent::SessionSkipped { reason } => {
                    println!("\n{} {}", "⚠".yellow(), reason.yellow());
                }

                TestEvent::NotebooksDiscovered { paths } => {
                    print_section(&format!("Found {} notebook(s) to test", paths.len()));
                    for (i, path) in paths.iter().enumerate() {
                        println!("{}. {}", i + 1, path);
                    }
                }

                TestEvent::NotebookStarted {
                    index,
                    total,
                    path,
                    command,
                } => {
                    print_section(&format!("Executing [{}/{}]: {}", index + 1, total, path));
                    log::info!("Running command: {}", command);
                    log::info!(
                        "Starting execution at {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
                    );

                    let pb = ProgressBar::new_spinner();
                    if !is_tty {
                        pb.set_draw_target(ProgressDrawTarget::hidden());
                    }
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("  {spinner} {msg} [{elapsed}]")
                    {
                        pb.set_style(style);
                    }
                    pb.set_message(path.dimmed().to_string());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                TestEvent::NotebookPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("{} PASSED in {}", "✓".green(), seconds(duration_ms));
                    log::info!(
                        "Completed at {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
                    );
                }

                TestEvent::NotebookFailed {
                    path,
                    kind,
                    message,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!(
                        "{} {} after {}: {}",
                        "✗".red(),
                        kind.label().red().bold(),
                        seconds(duration_ms),
                        message
                    );
                    println!("  {} Notebook {} failed", "→".blue(), path);
                }

                TestEvent::SessionFinished { summary, results } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }

                    print_section("Test Summary");
                    for result in &results {
                        let status = match result.status.failure_kind() {
                            None => "PASSED".green().bold(),
                            Some(kind) => kind.label().red().bold(),
                        };
                        println!(
                            "  [{}] {} ({})",
                            status,
                            result.path,
                            seconds(result.duration_ms)
                        );
                    }

                    println!();
                    println!("Total notebooks: {}", summary.total);
                    println!("{} Passed: {}", "✓".green(), summary.passed.to_string().green());
                    println!("{} Failed: {}", "✗".red(), summary.failed.to_string().red());
                    for (count, label) in [
                        (summary.timed_out, "timed out"),
                        (summary.execution_errors, "execution errors"),
                        (summary.tool_errors, "tool errors"),
                        (summary.interrupted, "interrupted"),
                    ] {
                        if count > 0 {
                            println!("  {}: {}", label, count);
                        }
                    }
                    println!("Notebook time: {}", seconds(summary.total_duration_ms));
                    if let Some(wall) = summary.wall_clock_ms {
                        println!("Total time: {}", seconds(wall));
                    }

                    for failed in results.iter().filter(|r| !r.is_passed()) {
                        print_section(&format!("FAILED: {}", failed.path));
                        if let Some(code) = failed.exit_code {
                            println!("Exit code: {}", code);
                        }
                        println!("\nSTDOUT:\n{}", failed.stdout);
                        println!("\nSTDERR:\n{}", failed.stderr);
                    }
                }

                TestEvent::Log { message } => {
                    if let Some(pb) = &spinner {
                        pb.println(format!("    {}", message));
                    } else {
                        println!("    {}", message);
                    }
                }
            }
        }
    }
}
