//! Traversal-safe filename resolution under the log root.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{LogTailError, Result};

/// Turns untrusted filenames into absolute paths inside the log root.
///
/// Only single-level names are accepted: anything containing `..`, `/` or `\`
/// is rejected before touching the filesystem. Resolution is purely lexical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver rooted at `log_dir`, made absolute and normalized.
    #[must_use]
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        let dir = log_dir.as_ref();
        let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        Self {
            root: normalize(&absolute),
        }
    }

    /// The normalized absolute log root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if `name` is a bare filename with no traversal characters.
    #[must_use]
    pub fn is_plain_filename(name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && !name.contains("..")
            && !name.contains('/')
            && !name.contains('\\')
            && !name.contains('\0')
    }

    /// Resolves `filename` to an absolute path directly under the log root.
    ///
    /// # Errors
    ///
    /// Returns [`LogTailError::SecurityViolation`] if the name contains
    /// traversal characters or would land outside the root.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if !Self::is_plain_filename(filename) {
            warn!(filename = %filename, "rejected log filename with traversal characters");
            return Err(LogTailError::SecurityViolation(filename.to_string()));
        }

        let resolved = normalize(&self.root.join(filename));
        if !resolved.starts_with(&self.root) || resolved.parent() != Some(self.root.as_path()) {
            warn!(filename = %filename, "log filename resolved outside the log root");
            return Err(LogTailError::SecurityViolation(filename.to_string()));
        }

        Ok(resolved)
    }
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
