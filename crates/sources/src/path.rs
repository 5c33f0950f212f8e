//! Path guard — keeps the file source inside the workspace root.
//!
//! Query text is untrusted input: a path named in it must not climb out of
//! the root via `..`, absolute paths, or symlinks.

use std::path::{Component, Path, PathBuf};

/// Error returned when a path cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum PathGuardError {
    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' is outside the workspace root")]
    OutsideRoot { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

/// Resolves query-supplied paths against a canonical workspace root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Create a guard for `root`. The root must exist.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, PathGuardError> {
        let root = root.as_ref();
        let canonical = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| PathGuardError::ResolveFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { root: canonical })
    }

    /// The canonical root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `candidate` to an existing path inside the root.
    ///
    /// Relative paths are joined onto the root; absolute paths are accepted
    /// only if they already live under it. Symlinks are resolved before the
    /// containment check.
    pub async fn resolve(&self, candidate: &str) -> Result<PathBuf, PathGuardError> {
        let normalized = candidate.replace('\\', "/");
        let as_path = Path::new(&normalized);

        if as_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(PathGuardError::PathTraversal {
                path: candidate.into(),
            });
        }

        let joined = if as_path.is_absolute() {
            as_path.to_path_buf()
        } else {
            self.root.join(as_path)
        };

        let canonical =
            tokio::fs::canonicalize(&joined)
                .await
                .map_err(|e| PathGuardError::ResolveFailed {
                    path: candidate.into(),
                    reason: e.to_string(),
                })?;

        if !canonical.starts_with(&self.root) {
            return Err(PathGuardError::OutsideRoot {
                path: candidate.into(),
            });
        }

        Ok(canonical)
    }
}
