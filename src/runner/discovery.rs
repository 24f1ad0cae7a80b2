use crate::error::HarnessError;
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Walks a tree for notebook files, pruning excluded directories
pub struct NotebookDiscovery {
    root: PathBuf,
    exclude: Vec<Pattern>,
}

impl NotebookDiscovery {
    pub fn new(root: &Path, exclude: &[String]) -> Result<Self, HarnessError> {
        let exclude = exclude
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    HarnessError::InvalidConfig(format!("bad exclude pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        // The root itself is never pruned, even if its name matches
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        self.exclude.iter().any(|p| p.matches(&name))
    }

    /// Lazy walk; each call starts a fresh traversal
    pub fn iter(&self) -> impl Iterator<Item = Result<PathBuf, HarnessError>> + '_ {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(move |e| !self.is_excluded(e))
            .filter_map(move |entry| match entry {
                Ok(e) => {
                    let is_notebook = e.file_type().is_file()
                        && e.path()
                            .extension()
                            .map_or(false, |ext| ext == NOTEBOOK_EXTENSION);
                    is_notebook.then(|| Ok(self.relative(e.path())))
                }
                Err(source) => Some(Err(HarnessError::Discovery {
                    root: self.root.clone(),
                    source,
                })),
            })
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Sorted, de-duplicated notebook paths relative to the root.
    /// An empty result is a setup error.
    pub fn discover(&self) -> Result<Vec<PathBuf>, HarnessError> {
        let mut found = BTreeSet::new();
        for path in self.iter() {
            found.insert(path?);
        }

        if found.is_empty() {
            return Err(HarnessError::NoNotebooks {
                root: self.root.clone(),
            });
        }

        Ok(found.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::DEFAULT_EXCLUDES;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    fn default_discovery(root: &Path) -> NotebookDiscovery {
        let exclude: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        NotebookDiscovery::new(root, &exclude).unwrap()
    }

    #[test]
    fn test_discovery_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "z_last.ipynb");
        touch(root, "basics/b.ipynb");
        touch(root, "basics/a.ipynb");
        touch(root, "advanced/qaoa.ipynb");
        touch(root, "basics/notes.md");
        touch(root, "venv/lib/site.ipynb");
        touch(root, ".venv/share/jupyter/x.ipynb");
        touch(root, "myvenv/y.ipynb");
        touch(root, "basics/.ipynb_checkpoints/a-checkpoint.ipynb");

        let found = default_discovery(root).discover().unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            names,
            vec![
                "advanced/qaoa.ipynb",
                "basics/a.ipynb",
                "basics/b.ipynb",
                "z_last.ipynb",
            ]
        );
    }

    #[test]
    fn test_iterator_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "one.ipynb");
        touch(dir.path(), "nested/two.ipynb");

        let discovery = default_discovery(dir.path());
        let first: BTreeSet<PathBuf> = discovery.iter().map(|r| r.unwrap()).collect();
        let second: BTreeSet<PathBuf> = discovery.iter().map(|r| r.unwrap()).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_tree_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "README.md");
        touch(dir.path(), "venv/hidden.ipynb");

        let err = default_discovery(dir.path()).discover().unwrap_err();
        assert!(matches!(err, HarnessError::NoNotebooks { .. }));
        assert!(err.to_string().starts_with("no notebooks found under"));
    }

    #[test]
    fn test_custom_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "keep/a.ipynb");
        touch(dir.path(), "drafts/b.ipynb");

        let discovery = NotebookDiscovery::new(dir.path(), &["draft*".to_string()]).unwrap();
        let found = discovery.discover().unwrap();
        assert_eq!(found, vec![PathBuf::from("keep").join("a.ipynb")]);
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let result = NotebookDiscovery::new(Path::new("."), &["[".to_string()]);
        assert!(matches!(result, Err(HarnessError::InvalidConfig(_))));
    }
}
