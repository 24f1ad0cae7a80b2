use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nb_tester::credential::{CredentialResolver, DEFAULT_API_KEY_VAR};
use nb_tester::error::{CredentialError, HarnessError, EXIT_OK, EXIT_SETUP_ERROR};
use nb_tester::runner::NotebookDiscovery;
use nb_tester::utils::config::Config;
use nb_tester::{report, runner};

#[derive(Parser)]
#[command(name = "nb-tester")]
#[command(version)]
#[command(about = "Execute every notebook in a repository and report failures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and execute notebooks
    Run {
        /// Root directory to search for notebooks
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Per-notebook timeout in seconds (overrides NBEXEC_TIMEOUT_SECONDS)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Python interpreter used to run jupyter nbconvert
        #[arg(long, default_value = "python3")]
        python: String,

        /// nbconvert output format
        #[arg(long = "to", default_value = "html")]
        output_format: String,

        /// Extra directory name patterns to skip (glob, repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Stop after the first failing notebook
        #[arg(long, default_value = "false")]
        fail_fast: bool,

        /// Environment variable holding the API key
        #[arg(long, default_value = DEFAULT_API_KEY_VAR)]
        credential_var: String,

        /// Run even when the API key is not set
        #[arg(long, default_value = "false")]
        no_skip: bool,

        /// Output directory for reports
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Write JSON and JUnit reports
        #[arg(long, default_value = "false")]
        report: bool,
    },

    /// List the notebooks that would be executed
    List {
        /// Root directory to search for notebooks
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Extra directory name patterns to skip (glob, repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Check that the API key can be resolved (never prints it)
    Credential {
        /// Environment variable holding the API key
        #[arg(long, default_value = DEFAULT_API_KEY_VAR)]
        var: String,
    },

    /// Generate report from test results
    Report {
        /// Path to test-results.json
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "junit")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LOGLEVEL", "info"))
        .format_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let code = match execute(cli).await {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("\n{} {:#}", "✗".red().bold(), e);
            exit_code_for(&e)
        }
    };

    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<HarnessError>() {
        e.exit_code()
    } else if let Some(e) = err.downcast_ref::<CredentialError>() {
        e.exit_code()
    } else {
        EXIT_SETUP_ERROR
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            path,
            timeout,
            python,
            output_format,
            exclude,
            fail_fast,
            credential_var,
            no_skip,
            output,
            report,
        } => {
            let mut config = Config::from_env()?;
            config.root = path;
            if let Some(secs) = timeout {
                if secs == 0 {
                    return Err(HarnessError::InvalidConfig(
                        "--timeout must be a positive integer".to_string(),
                    )
                    .into());
                }
                config.timeout_secs = secs;
            }
            config.python = python;
            config.output_format = output_format;
            config.exclude.extend(exclude);
            config.fail_fast = fail_fast;
            config.credential_var = credential_var;
            config.skip_without_credential = !no_skip;
            config.output_dir = output;
            config.report = report;

            println!(
                "{} Running notebooks from: {}",
                "▶".green().bold(),
                config.root.display()
            );
            if config.fail_fast {
                println!("  Fail-fast: {}", "Enabled".yellow());
            }
            if config.report {
                println!(
                    "  Reports: {}",
                    config.output_dir.display().to_string().cyan()
                );
            }

            let stop = Arc::new(AtomicBool::new(false));
            let stop_handler = stop.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                println!("\n\n{} Interrupt received, stopping after current notebook...", "⏹️ ".yellow());
                stop_handler.store(true, Ordering::SeqCst);
            }) {
                log::warn!("Could not install Ctrl-C handler: {}", e);
            }

            let summary = runner::run_tests(config, stop).await?;
            if summary.skipped {
                println!("{} Skipped", "○".yellow());
            } else {
                println!(
                    "\n{} All {} notebook(s) passed",
                    "✅".green(),
                    summary.total
                );
            }
        }

        Commands::List { path, exclude } => {
            let mut config = Config::default();
            config.exclude.extend(exclude);

            let notebooks = NotebookDiscovery::new(&path, &config.exclude)?.discover()?;
            println!(
                "{} Found {} notebook(s) under {}",
                "🔍".to_string().blue(),
                notebooks.len(),
                path.display()
            );
            for (i, notebook) in notebooks.iter().enumerate() {
                println!("{}. {}", i + 1, notebook.display());
            }
        }

        Commands::Credential { var } => {
            let credential = CredentialResolver::default().resolve(&var)?;
            println!(
                "{} {} resolved from {} ({} characters)",
                "✓".green(),
                var.cyan(),
                credential.source(),
                credential.len()
            );
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())?;
        }
    }

    Ok(())
}
