pub mod json;
pub mod junit;
pub mod types;

use crate::runner::state::SessionState;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate report from a saved `test-results.json`
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let test_results = json::load(results_path)?;

    match format {
        "json" => json::generate(&test_results, output),
        "junit" => junit::generate(&test_results, output),
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}

/// Write `test-results.json` and `junit.xml` for a finished session
pub fn write_session(session: &SessionState, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let results = types::TestResults::from_session(session);
    json::generate(&results, Some(&output_dir.join(json::RESULTS_FILE)))?;
    junit::write_report(&results, output_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{ExecutionResult, NotebookStatus};

    #[test]
    fn test_write_session_then_regenerate() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionState::new("session-1");
        session.record(ExecutionResult {
            path: "intro.ipynb".to_string(),
            status: NotebookStatus::Passed,
            duration_ms: 1200,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            started_at: "2024-01-01 10:00:00".to_string(),
        });

        write_session(&session, dir.path()).unwrap();
        let results_path = dir.path().join(json::RESULTS_FILE);
        assert!(results_path.exists());
        assert!(dir.path().join("junit.xml").exists());

        let out = dir.path().join("again.xml");
        generate_report(&results_path, "junit", Some(&out)).unwrap();
        let xml = std::fs::read_to_string(out).unwrap();
        assert!(xml.contains(r#"<testcase name="intro.ipynb""#));

        assert!(generate_report(&results_path, "pdf", None).is_err());
    }
}
