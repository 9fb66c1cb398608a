//! Engine configuration.
//!
//! Read once at startup from a JSON file or built in code; there is no
//! hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogTailError, Result};
use crate::path::PathResolver;

/// Default name of the live log file.
pub const DEFAULT_ACTIVE_FILE: &str = "application.log";

/// Default hard cap on tail requests.
pub const DEFAULT_MAX_TAIL_LINES: usize = 1000;

/// Default match cap for full-scan search.
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 5000;

/// Default polling loop delay in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default event loop wait slice in milliseconds.
pub const DEFAULT_WATCH_TIMEOUT_MS: u64 = 500;

/// Default per-cycle broadcast line cap.
pub const DEFAULT_MAX_BATCH_LINES: usize = 100;

/// Configuration for the log tailing engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogTailConfig {
    /// Log root directory.
    pub log_dir: PathBuf,
    /// Name of the current (live) log file.
    pub active_file: String,
    /// Hard cap applied to tail requests.
    pub max_tail_lines: usize,
    /// Match cap for full-scan search.
    pub max_search_results: usize,
    /// Polling loop delay in milliseconds.
    pub poll_interval_ms: u64,
    /// Event loop wait slice in milliseconds.
    pub watch_timeout_ms: u64,
    /// Maximum lines pushed per broadcast cycle.
    pub max_batch_lines: usize,
}

impl Default for LogTailConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            active_file: DEFAULT_ACTIVE_FILE.to_string(),
            max_tail_lines: DEFAULT_MAX_TAIL_LINES,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            watch_timeout_ms: DEFAULT_WATCH_TIMEOUT_MS,
            max_batch_lines: DEFAULT_MAX_BATCH_LINES,
        }
    }
}

impl LogTailConfig {
    /// Creates a config rooted at the given log directory.
    #[must_use]
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LogTailError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| LogTailError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(LogTailError::Config("log_dir cannot be empty".to_string()));
        }

        if self.active_file.is_empty() {
            return Err(LogTailError::Config(
                "active_file cannot be empty".to_string(),
            ));
        }

        if !PathResolver::is_plain_filename(&self.active_file) {
            return Err(LogTailError::Config(
                "active_file must be a bare filename".to_string(),
            ));
        }

        if self.max_tail_lines == 0 {
            return Err(LogTailError::Config(
                "max_tail_lines must be greater than 0".to_string(),
            ));
        }

        if self.max_search_results == 0 {
            return Err(LogTailError::Config(
                "max_search_results must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 || self.watch_timeout_ms == 0 {
            return Err(LogTailError::Config(
                "poll_interval_ms and watch_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_batch_lines == 0 {
            return Err(LogTailError::Config(
                "max_batch_lines must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Set the active file name.
    #[must_use]
    pub fn with_active_file(mut self, name: impl Into<String>) -> Self {
        self.active_file = name.into();
        self
    }

    /// Set the tail cap.
    #[must_use]
    pub const fn with_max_tail_lines(mut self, max: usize) -> Self {
        self.max_tail_lines = max;
        self
    }

    /// Set the search match cap.
    #[must_use]
    pub const fn with_max_search_results(mut self, max: usize) -> Self {
        self.max_search_results = max;
        self
    }

    /// Set the polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the event loop wait slice.
    #[must_use]
    pub const fn with_watch_timeout(mut self, timeout: Duration) -> Self {
        self.watch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the per-cycle broadcast cap.
    #[must_use]
    pub const fn with_max_batch_lines(mut self, max: usize) -> Self {
        self.max_batch_lines = max;
        self
    }

    /// Polling loop delay.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Event loop wait slice.
    #[must_use]
    pub const fn watch_timeout(&self) -> Duration {
        Duration::from_millis(self.watch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_config_is_valid() {
        let config = LogTailConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.active_file, DEFAULT_ACTIVE_FILE);
        assert_eq!(config.max_search_results, 5000);
        assert_eq!(config.max_batch_lines, 100);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn from_json_fills_defaults() {
        let config = LogTailConfig::from_json(r#"{"log_dir": "/var/log/app"}"#).expect("parse");
        assert_eq!(config.log_dir, PathBuf::from("/var/log/app"));
        assert_eq!(config.active_file, DEFAULT_ACTIVE_FILE);
        assert_eq!(config.max_tail_lines, DEFAULT_MAX_TAIL_LINES);
    }

    #[test]
    fn from_json_rejects_garbage() {
        let err = LogTailConfig::from_json("not json").expect_err("should fail");
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logtail.json");
        let config = LogTailConfig::new("/srv/logs").with_active_file("server.log");
        std::fs::write(&path, serde_json::to_string_pretty(&config).expect("serialize"))
            .expect("write");

        let loaded = LogTailConfig::from_file(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn from_file_missing() {
        let err = LogTailConfig::from_file("/nonexistent/logtail.json").expect_err("missing");
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test_case(LogTailConfig::default().with_active_file("") ; "empty active file")]
    #[test_case(LogTailConfig::default().with_active_file("../app.log") ; "traversal in active file")]
    #[test_case(LogTailConfig::default().with_active_file("sub/app.log") ; "nested active file")]
    #[test_case(LogTailConfig::default().with_max_tail_lines(0) ; "zero tail cap")]
    #[test_case(LogTailConfig::default().with_max_search_results(0) ; "zero search cap")]
    #[test_case(LogTailConfig::default().with_poll_interval(Duration::ZERO) ; "zero poll interval")]
    #[test_case(LogTailConfig::default().with_max_batch_lines(0) ; "zero batch cap")]
    fn invalid_configs_are_rejected(config: LogTailConfig) {
        assert!(config.validate().is_err());
    }
}
