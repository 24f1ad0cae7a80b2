pub mod credential;
pub mod error;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use credential::{get_api_key, Credential, CredentialResolver};
pub use error::{CredentialError, HarnessError};
pub use report::generate_report;
pub use runner::run_tests;
pub use utils::config::Config;
