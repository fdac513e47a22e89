use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps document paths inside the site root.
#[derive(Debug, Clone)]
pub struct SiteGuard {
    /// Canonical path to the site root
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside site root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SiteGuard {
    /// Create a guard for `root`; symlinks in the root itself are resolved.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|source| SafetyError::Canonicalize {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Resolve a document path and check it stays inside the root.
    ///
    /// Relative paths are joined onto the root. Returns the canonical path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        // Canonicalize to resolve symlinks and .. components
        let canonical = absolute
            .canonicalize()
            .map_err(|source| SafetyError::Canonicalize {
                path: absolute.clone(),
                source,
            })?;

        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical,
                root: self.root.clone(),
            });
        }

        Ok(canonical)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
