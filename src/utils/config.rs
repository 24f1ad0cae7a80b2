use crate::credential::{self, DEFAULT_API_KEY_VAR};
use crate::error::HarnessError;
use std::path::PathBuf;

/// Per-notebook timeout override, in seconds
pub const ENV_TIMEOUT: &str = "NBEXEC_TIMEOUT_SECONDS";

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Directory names never descended into during discovery
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "venv",
    ".venv",
    "*venv",
    "env",
    "site-packages",
    "node_modules",
    ".ipynb_checkpoints",
    ".tox",
    ".git",
];

/// Harness configuration, built once per invocation
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the tree searched for notebooks
    pub root: PathBuf,

    /// Glob patterns matched against each directory name
    pub exclude: Vec<String>,

    /// Timeout handed to the execution tool (seconds)
    pub timeout_secs: u64,

    /// Python interpreter used to launch `jupyter nbconvert`
    pub python: String,

    /// nbconvert output format
    pub output_format: String,

    /// Stop after the first failing notebook
    pub fail_fast: bool,

    /// Environment variable holding the API key
    pub credential_var: String,

    /// Skip the whole sweep when the API key is absent
    pub skip_without_credential: bool,

    /// Output directory for reports
    pub output_dir: PathBuf,

    /// Write JSON and JUnit reports after the run
    pub report: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            timeout_secs: DEFAULT_TIMEOUT_SECONDS,
            python: "python3".to_string(),
            output_format: "html".to_string(),
            fail_fast: false,
            credential_var: DEFAULT_API_KEY_VAR.to_string(),
            skip_without_credential: true,
            output_dir: PathBuf::from("./output"),
            report: false,
        }
    }
}

impl Config {
    /// Defaults plus the process environment
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            config.timeout_secs = parse_timeout(&raw)?;
        }
        Ok(config)
    }

    /// True when the sweep should be skipped for lack of an API key
    pub fn should_skip<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        self.skip_without_credential
            && lookup(&self.credential_var).map_or(true, |v| credential::is_blank(&v))
    }
}

fn parse_timeout(raw: &str) -> Result<u64, HarnessError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(HarnessError::InvalidConfig(format!(
            "{} must be a positive integer, got '{}'",
            ENV_TIMEOUT, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.timeout_secs, 600);
        assert!(!config.fail_fast);
        assert_eq!(config.credential_var, "IONQ_API_KEY");
    }

    #[test]
    fn test_timeout_override() {
        let config = Config::from_lookup(|name| {
            (name == ENV_TIMEOUT).then(|| " 1200 ".to_string())
        })
        .unwrap();
        assert_eq!(config.timeout_secs, 1200);
    }

    #[test]
    fn test_malformed_timeout_is_config_error() {
        for raw in ["abc", "0", "-5", ""] {
            let result = Config::from_lookup(|_| Some(raw.to_string()));
            assert!(
                matches!(result, Err(HarnessError::InvalidConfig(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_skip_when_credential_missing() {
        let config = Config::default();
        assert!(config.should_skip(|_| None));
        assert!(config.should_skip(|_| Some(String::new())));
        assert!(config.should_skip(|_| Some("   ".to_string())));
        assert!(!config.should_skip(|_| Some("key".to_string())));

        let config = Config {
            skip_without_credential: false,
            ..Config::default()
        };
        assert!(!config.should_skip(|_| None));
    }
}
