//! Filtered tail and full-scan search over a single log file.
//!
//! Every failure is folded into a [`SearchResult`] with `success = false`;
//! nothing on this path returns an error to the caller.

use std::collections::VecDeque;
use std::fs::File;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::LogTailConfig;
use crate::error::{LogTailError, Result};
use crate::parser::LineParser;
use crate::path::PathResolver;
use crate::registry::FileRegistry;
use crate::tail::{open_lines, TailReader};
use crate::types::{LogEntry, LogFileDescriptor, LogSearchCriteria, SearchResult};

/// Headroom factor for tail mode: raw lines read per requested match.
const TAIL_OVERREAD_FACTOR: usize = 3;

/// A validated file opened for raw byte download.
#[derive(Debug)]
pub struct LogDownload {
    /// Leaf name of the file.
    pub filename: String,
    /// Size in bytes at open time.
    pub size_bytes: u64,
    /// Open handle positioned at the start.
    pub file: File,
}

/// Query surface over the log directory.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    resolver: PathResolver,
    registry: FileRegistry,
    reader: TailReader,
    parser: LineParser,
    active_file: String,
    max_tail_lines: usize,
    max_search_results: usize,
}

impl SearchEngine {
    /// Creates a search engine from the engine configuration.
    #[must_use]
    pub fn new(config: &LogTailConfig) -> Self {
        let resolver = PathResolver::new(&config.log_dir);
        Self {
            registry: FileRegistry::new(resolver.clone(), config.active_file.clone()),
            resolver,
            reader: TailReader::new(),
            parser: LineParser::new(),
            active_file: config.active_file.clone(),
            max_tail_lines: config.max_tail_lines,
            max_search_results: config.max_search_results,
        }
    }

    /// Lists the files in the log directory.
    #[must_use]
    pub fn list_files(&self) -> Vec<LogFileDescriptor> {
        self.registry.list()
    }

    /// Returns the most recent matching entries of a file, in file order.
    #[must_use]
    pub fn tail(&self, criteria: &LogSearchCriteria) -> SearchResult {
        let filename = self.target(criteria);
        match self.tail_entries(&filename, criteria) {
            Ok(entries) => SearchResult::ok(filename, entries),
            Err(e) => self.failure(filename, &e),
        }
    }

    /// Scans a file from the start, collecting matches up to the search cap.
    #[must_use]
    pub fn search(&self, criteria: &LogSearchCriteria) -> SearchResult {
        let filename = self.target(criteria);
        match self.scan_entries(&filename, criteria) {
            Ok((entries, truncated)) => {
                SearchResult::ok(filename, entries).with_truncated(truncated)
            }
            Err(e) => self.failure(filename, &e),
        }
    }

    /// Opens a validated file for raw download.
    ///
    /// # Errors
    ///
    /// Returns [`LogTailError::SecurityViolation`] for unsafe names,
    /// [`LogTailError::NotFound`] for missing files, or an I/O error.
    pub fn open_download(&self, filename: &str) -> Result<LogDownload> {
        let path = self.existing_path(filename)?;
        let file = File::open(&path)?;
        let size_bytes = file.metadata()?.len();
        Ok(LogDownload {
            filename: filename.to_string(),
            size_bytes,
            file,
        })
    }

    fn target(&self, criteria: &LogSearchCriteria) -> String {
        criteria
            .filename
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or(&self.active_file)
            .to_string()
    }

    fn existing_path(&self, filename: &str) -> Result<PathBuf> {
        let path = self.resolver.resolve(filename)?;
        if !path.is_file() {
            return Err(LogTailError::NotFound(filename.to_string()));
        }
        Ok(path)
    }

    fn tail_entries(&self, filename: &str, criteria: &LogSearchCriteria) -> Result<Vec<LogEntry>> {
        let path = self.existing_path(filename)?;
        let wanted = criteria.lines.min(self.max_tail_lines);
        if wanted == 0 {
            return Ok(Vec::new());
        }

        let raw = self
            .reader
            .last_lines(&path, wanted.saturating_mul(TAIL_OVERREAD_FACTOR))?;

        let mut matches: VecDeque<LogEntry> = VecDeque::new();
        for (i, line) in raw.iter().enumerate() {
            let entry = self.parser.parse(line, i + 1);
            if entry.matches(criteria) {
                matches.push_back(entry);
                if matches.len() > wanted {
                    matches.pop_front();
                }
            }
        }

        debug!(filename = %filename, read = raw.len(), matched = matches.len(), "tail completed");
        Ok(matches.into())
    }

    fn scan_entries(
        &self,
        filename: &str,
        criteria: &LogSearchCriteria,
    ) -> Result<(Vec<LogEntry>, bool)> {
        let path = self.existing_path(filename)?;
        let mut entries = Vec::new();
        let mut truncated = false;

        for (i, line) in open_lines(&path)?.enumerate() {
            let entry = self.parser.parse(&line?, i + 1);
            if entry.matches(criteria) {
                entries.push(entry);
                if entries.len() >= self.max_search_results {
                    truncated = true;
                    break;
                }
            }
        }

        debug!(filename = %filename, matched = entries.len(), truncated, "search completed");
        Ok((entries, truncated))
    }

    fn failure(&self, filename: String, error: &LogTailError) -> SearchResult {
        match error {
            LogTailError::SecurityViolation(_) => {
                warn!(filename = %filename, "path traversal attempt blocked");
            }
            LogTailError::NotFound(_) => {
                debug!(filename = %filename, "requested log file not found");
            }
            other => {
                warn!(filename = %filename, error = %other, "log query failed");
            }
        }
        SearchResult::failure(filename, error.user_message())
    }
}
