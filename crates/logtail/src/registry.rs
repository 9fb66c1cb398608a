//! Enumeration of log files in the log directory.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::path::PathResolver;
use crate::types::LogFileDescriptor;

/// Extensions picked up by the listing.
const LISTED_EXTENSIONS: &[&str] = &["log", "gz", "zip"];

/// Extensions that mark a file as a compressed archive.
const ARCHIVE_EXTENSIONS: &[&str] = &["gz", "zip"];

/// Lists current, rotated and compressed log files with their metadata.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    resolver: PathResolver,
    active_file: String,
}

impl FileRegistry {
    /// Creates a registry over the resolver's log root.
    #[must_use]
    pub fn new(resolver: PathResolver, active_file: impl Into<String>) -> Self {
        Self {
            resolver,
            active_file: active_file.into(),
        }
    }

    /// Returns true if the path carries a compression suffix.
    #[must_use]
    pub fn is_archive(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ARCHIVE_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
    }

    /// Lists log files, the active file first, then newest first.
    ///
    /// A missing directory yields an empty list. Files whose metadata cannot be
    /// read are skipped.
    #[must_use]
    pub fn list(&self) -> Vec<LogFileDescriptor> {
        let dir = self.resolver.root();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "log directory not readable, listing nothing");
                return Vec::new();
            }
        };

        let mut files: Vec<LogFileDescriptor> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "failed to read log directory entry");
                    None
                }
            })
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| LISTED_EXTENSIONS.iter().any(|l| ext.eq_ignore_ascii_case(l)))
            })
            .filter_map(|entry| self.describe(&entry))
            .collect();

        files.sort_by(|a, b| {
            b.is_current
                .cmp(&a.is_current)
                .then_with(|| b.last_modified.cmp(&a.last_modified))
        });
        files
    }

    fn describe(&self, entry: &fs::DirEntry) -> Option<LogFileDescriptor> {
        let filename = entry.file_name().to_string_lossy().into_owned();
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => return None,
            Err(e) => {
                warn!(filename = %filename, error = %e, "failed to read log file metadata, skipping");
                return None;
            }
        };
        let last_modified = match metadata.modified() {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(e) => {
                warn!(filename = %filename, error = %e, "failed to read log file mtime, skipping");
                return None;
            }
        };

        Some(LogFileDescriptor {
            is_archived: Self::is_archive(&entry.path()),
            is_current: filename == self.active_file,
            filename,
            size_bytes: metadata.len(),
            last_modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, content: &[u8], age_secs: u64) {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("write");
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_modified(mtime))
            .expect("set mtime");
    }

    fn registry(dir: &TempDir) -> FileRegistry {
        FileRegistry::new(PathResolver::new(dir.path()), "application.log")
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let registry = FileRegistry::new(
            PathResolver::new(dir.path().join("does-not-exist")),
            "application.log",
        );
        assert!(registry.list().is_empty());
    }

    #[test]
    fn current_file_first_then_newest() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "application.log", b"current\n", 3600);
        touch(&dir, "application.2026-01-18.log.gz", b"x", 300);
        touch(&dir, "application.2026-01-19.log", b"yy", 60);
        touch(&dir, "old.zip", b"zzz", 7200);

        let names: Vec<String> = registry(&dir).list().into_iter().map(|f| f.filename).collect();
        assert_eq!(
            names,
            vec![
                "application.log",
                "application.2026-01-19.log",
                "application.2026-01-18.log.gz",
                "old.zip",
            ]
        );
    }

    #[test]
    fn ignores_other_extensions_and_directories() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "application.log", b"", 0);
        touch(&dir, "notes.txt", b"nope", 0);
        touch(&dir, "README", b"nope", 0);
        fs::create_dir(dir.path().join("archive.log")).expect("mkdir");

        let files = registry(&dir).list();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "application.log");
    }

    #[test]
    fn descriptor_flags_and_size() {
        let dir = TempDir::new().expect("tempdir");
        touch(&dir, "application.log", b"0123456789", 0);
        touch(&dir, "application.1.log.gz", b"abc", 10);

        let files = registry(&dir).list();
        let current = &files[0];
        assert!(current.is_current);
        assert!(!current.is_archived);
        assert_eq!(current.size_bytes, 10);

        let archived = &files[1];
        assert!(!archived.is_current);
        assert!(archived.is_archived);
        assert_eq!(archived.size_bytes, 3);
    }

    #[test]
    fn archive_detection() {
        assert!(FileRegistry::is_archive(Path::new("a.log.gz")));
        assert!(FileRegistry::is_archive(Path::new("a.ZIP")));
        assert!(!FileRegistry::is_archive(Path::new("a.log")));
        assert!(!FileRegistry::is_archive(Path::new("gz")));
    }
}
