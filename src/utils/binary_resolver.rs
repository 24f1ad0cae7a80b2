use crate::error::HarnessError;
use std::path::{Path, PathBuf};

/// Resolve the interpreter that runs `jupyter nbconvert`.
///
/// Paths with a separator are taken as given when they exist; bare names go
/// through `PATH`.
pub fn find_python(name: &str) -> Result<PathBuf, HarnessError> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
    }

    #[cfg(windows)]
    {
        if name == "python3" {
            if let Ok(path) = which::which("python") {
                return Ok(path);
            }
        }
    }

    which::which(name).map_err(|source| HarnessError::ToolNotFound {
        tool: name.to_string(),
        source,
    })
}
