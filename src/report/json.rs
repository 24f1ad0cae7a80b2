use super::types::TestResults;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// File name of the machine-readable results inside a report directory
pub const RESULTS_FILE: &str = "test-results.json";

/// Write results as pretty JSON to `output`, or stdout when `None`
pub fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, results)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            println!("JSON report saved to: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(results)?),
    }
    Ok(())
}

/// Read a results file written by [`generate`]
pub fn load(path: &Path) -> Result<TestResults> {
    let file = File::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a results file", path.display()))
}
