//! Core value types shared by the query and streaming paths.
//!
//! This module provides:
//! - [`LogEntry`] — One parsed (or fallback) log line
//! - [`LogFileDescriptor`] — Listing metadata for a file in the log directory
//! - [`LogSearchCriteria`] — Filters for tail and search requests
//! - [`SearchResult`] — Structured outcome of a tail or search request
//! - [`LogPushMessage`] — Batch pushed to live-tail subscribers
//! - [`SessionId`] — Opaque subscriber identity

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Level assigned to lines that do not match the line grammar.
pub const FALLBACK_LEVEL: &str = "TRACE";

/// Default result cap for tail mode.
pub const DEFAULT_TAIL_LINES: usize = 100;

/// A single log line, parsed when it matches the line grammar.
///
/// When parsing succeeds every optional field is populated. When it fails only
/// `level` (set to [`FALLBACK_LEVEL`]) and `message` (the raw line) carry data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// The full text of the line as read.
    pub raw_line: String,
    /// 1-based position within the current read operation.
    pub line_number: usize,
    /// Timestamp exactly as written in the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Thread name from the bracketed segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    /// Severity token, e.g. `INFO` or `ERROR`.
    pub level: String,
    /// Logger name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Message text (the raw line for fallback entries).
    pub message: String,
}

impl LogEntry {
    /// Builds a fallback entry for a line outside the grammar.
    #[must_use]
    pub fn unstructured(raw_line: impl Into<String>, line_number: usize) -> Self {
        let raw_line = raw_line.into();
        Self {
            message: raw_line.clone(),
            raw_line,
            line_number,
            timestamp: None,
            thread: None,
            level: FALLBACK_LEVEL.to_string(),
            logger: None,
        }
    }

    /// Returns true if the line matched the grammar.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        self.timestamp.is_some()
    }

    /// Checks if this entry passes the level and keyword filters.
    ///
    /// Both comparisons are case-insensitive. The time bounds of the criteria
    /// are not evaluated.
    #[must_use]
    pub fn matches(&self, criteria: &LogSearchCriteria) -> bool {
        if let Some(ref levels) = criteria.levels {
            if !levels.is_empty()
                && !levels.iter().any(|l| l.eq_ignore_ascii_case(&self.level))
            {
                return false;
            }
        }

        if let Some(ref keyword) = criteria.keyword {
            if !keyword.is_empty()
                && !self
                    .raw_line
                    .to_lowercase()
                    .contains(&keyword.to_lowercase())
            {
                return false;
            }
        }

        true
    }
}

/// Metadata for one file in the log directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileDescriptor {
    /// Leaf name, never a path.
    pub filename: String,
    /// Size on disk in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Whether the file carries a compression suffix.
    pub is_archived: bool,
    /// Whether this is the configured active file.
    pub is_current: bool,
}

/// Filter criteria for tail and search requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSearchCriteria {
    /// File to read; the active file when absent.
    #[serde(default)]
    pub filename: Option<String>,
    /// Inclusive level filter.
    #[serde(default)]
    pub levels: Option<HashSet<String>>,
    /// Case-insensitive substring matched against the raw line.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Result cap for tail mode.
    #[serde(default = "default_lines")]
    pub lines: usize,
    /// Accepted but not evaluated by matching.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Accepted but not evaluated by matching.
    #[serde(default)]
    pub end_time: Option<String>,
}

const fn default_lines() -> usize {
    DEFAULT_TAIL_LINES
}

impl Default for LogSearchCriteria {
    fn default() -> Self {
        Self {
            filename: None,
            levels: None,
            keyword: None,
            lines: DEFAULT_TAIL_LINES,
            start_time: None,
            end_time: None,
        }
    }
}

impl LogSearchCriteria {
    /// Creates criteria that match everything in the active file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets a specific file.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Adds a level to the inclusive level filter.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.levels.get_or_insert_with(HashSet::new).insert(level.into());
        self
    }

    /// Sets the keyword filter.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Sets the tail result cap.
    #[must_use]
    pub const fn with_lines(mut self, lines: usize) -> Self {
        self.lines = lines;
        self
    }
}

/// Outcome of a tail or search request.
///
/// Failures are reported through `success = false` and `error`, never by
/// returning an `Err` to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Whether the request completed.
    pub success: bool,
    /// Matching entries in file order.
    pub entries: Vec<LogEntry>,
    /// The file that was read.
    pub filename: String,
    /// Number of entries returned.
    pub total_lines: usize,
    /// Set by full-scan search: whether the match cap was reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    /// Caller-facing failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResult {
    /// Builds a successful result.
    #[must_use]
    pub fn ok(filename: impl Into<String>, entries: Vec<LogEntry>) -> Self {
        Self {
            success: true,
            total_lines: entries.len(),
            entries,
            filename: filename.into(),
            truncated: None,
            error: None,
        }
    }

    /// Builds a failed result carrying a caller-facing message.
    #[must_use]
    pub fn failure(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            entries: Vec::new(),
            filename: filename.into(),
            total_lines: 0,
            truncated: None,
            error: Some(error.into()),
        }
    }

    /// Marks whether the match cap was hit.
    #[must_use]
    pub const fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = Some(truncated);
        self
    }
}

/// Type tag of a push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushMessageKind {
    /// A batch of newly appended entries.
    #[serde(rename = "LOG_ENTRIES")]
    LogEntries,
}

/// One batch of new entries pushed to every live-tail subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPushMessage {
    /// Always [`PushMessageKind::LogEntries`].
    #[serde(rename = "type")]
    pub kind: PushMessageKind,
    /// Entries in file order.
    pub entries: Vec<LogEntry>,
    /// File the entries were read from.
    pub filename: String,
    /// When the batch was assembled.
    pub timestamp: DateTime<Utc>,
}

impl LogPushMessage {
    /// Creates a batch stamped with the current time.
    #[must_use]
    pub fn new(filename: impl Into<String>, entries: Vec<LogEntry>) -> Self {
        Self {
            kind: PushMessageKind::LogEntries,
            entries,
            filename: filename.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Opaque subscriber identity supplied by the delivery transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Wraps an existing transport token.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(level: &str, message: &str) -> LogEntry {
        LogEntry {
            raw_line: format!("2026-01-20 10:00:00.000 [main] {level} App - {message}"),
            line_number: 1,
            timestamp: Some("2026-01-20 10:00:00.000".to_string()),
            thread: Some("main".to_string()),
            level: level.to_string(),
            logger: Some("App".to_string()),
            message: message.to_string(),
        }
    }

    // ===========================================
    // LogEntry Tests
    // ===========================================

    #[test]
    fn unstructured_entry_carries_raw_line_as_message() {
        let entry = LogEntry::unstructured("\tat com.example.Foo.bar(Foo.java:42)", 7);
        assert_eq!(entry.level, FALLBACK_LEVEL);
        assert_eq!(entry.message, entry.raw_line);
        assert_eq!(entry.line_number, 7);
        assert!(entry.timestamp.is_none());
        assert!(entry.thread.is_none());
        assert!(entry.logger.is_none());
        assert!(!entry.is_structured());
    }

    #[test]
    fn matches_everything_without_filters() {
        let entry = structured("INFO", "start");
        assert!(entry.matches(&LogSearchCriteria::new()));
    }

    #[test]
    fn level_filter_is_case_insensitive() {
        let entry = structured("ERROR", "boom");
        assert!(entry.matches(&LogSearchCriteria::new().with_level("error")));
        assert!(entry.matches(&LogSearchCriteria::new().with_level("ERROR")));
        assert!(!entry.matches(&LogSearchCriteria::new().with_level("WARN")));
    }

    #[test]
    fn level_filter_accepts_any_listed_level() {
        let entry = structured("WARN", "disk low");
        let criteria = LogSearchCriteria::new().with_level("ERROR").with_level("WARN");
        assert!(entry.matches(&criteria));
    }

    #[test]
    fn empty_level_set_matches_all() {
        let entry = structured("DEBUG", "tick");
        let criteria = LogSearchCriteria {
            levels: Some(HashSet::new()),
            ..Default::default()
        };
        assert!(entry.matches(&criteria));
    }

    #[test]
    fn keyword_matches_raw_line_case_insensitively() {
        let entry = structured("INFO", "User Logged In");
        assert!(entry.matches(&LogSearchCriteria::new().with_keyword("logged in")));
        // The thread name is only part of the raw line, not the message.
        assert!(entry.matches(&LogSearchCriteria::new().with_keyword("[MAIN]")));
        assert!(!entry.matches(&LogSearchCriteria::new().with_keyword("logout")));
    }

    #[test]
    fn level_and_keyword_are_combined() {
        let entry = structured("ERROR", "boom");
        let both = LogSearchCriteria::new().with_level("ERROR").with_keyword("boom");
        let wrong_level = LogSearchCriteria::new().with_level("INFO").with_keyword("boom");
        assert!(entry.matches(&both));
        assert!(!entry.matches(&wrong_level));
    }

    #[test]
    fn time_bounds_are_not_evaluated() {
        let entry = structured("INFO", "start");
        let criteria = LogSearchCriteria {
            start_time: Some("2030-01-01 00:00:00.000".to_string()),
            end_time: Some("2030-01-02 00:00:00.000".to_string()),
            ..Default::default()
        };
        assert!(entry.matches(&criteria));
    }

    // ===========================================
    // Serialization Tests
    // ===========================================

    #[test]
    fn criteria_defaults_when_deserialized() {
        let criteria: LogSearchCriteria = serde_json::from_str("{}").expect("parse");
        assert_eq!(criteria, LogSearchCriteria::default());
        assert_eq!(criteria.lines, DEFAULT_TAIL_LINES);
    }

    #[test]
    fn criteria_accepts_camel_case_fields() {
        let json = r#"{"filename":"app.log","levels":["ERROR"],"keyword":"boom","lines":5,"startTime":"x"}"#;
        let criteria: LogSearchCriteria = serde_json::from_str(json).expect("parse");
        assert_eq!(criteria.filename.as_deref(), Some("app.log"));
        assert_eq!(criteria.lines, 5);
        assert_eq!(criteria.start_time.as_deref(), Some("x"));
    }

    #[test]
    fn search_result_shape() {
        let result = SearchResult::ok("app.log", vec![structured("INFO", "start")]);
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["success"], true);
        assert_eq!(json["totalLines"], 1);
        assert_eq!(json["filename"], "app.log");
        assert!(json.get("truncated").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["entries"][0]["rawLine"], result.entries[0].raw_line);
    }

    #[test]
    fn failure_result_has_no_entries() {
        let result = SearchResult::failure("app.log", "access denied");
        assert!(!result.success);
        assert!(result.entries.is_empty());
        assert_eq!(result.total_lines, 0);
        assert_eq!(result.error.as_deref(), Some("access denied"));
    }

    #[test]
    fn push_message_type_tag() {
        let message = LogPushMessage::new("app.log", vec![structured("INFO", "start")]);
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["type"], "LOG_ENTRIES");
        assert_eq!(json["filename"], "app.log");
        assert_eq!(json["entries"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn session_id_generate_is_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(SessionId::from("abc").as_str(), "abc");
        assert_eq!(SessionId::new("abc").to_string(), "abc");
    }
}
