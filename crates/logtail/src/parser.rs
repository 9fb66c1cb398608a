//! Line parsing into structured log entries.
//!
//! The grammar is `TIMESTAMP [THREAD] LEVEL LOGGER - MESSAGE`, for example:
//!
//! ```text
//! 2026-01-20 10:00:01.000 [main] ERROR com.example.App - boom
//! ```
//!
//! Every physical line is parsed on its own. Continuation lines of a stack
//! trace become fallback entries and are not attached to the line above.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::LogEntry;

#[allow(clippy::expect_used)]
static LINE_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}\.\d{3})\s+\[([^\[\]]*)\]\s+(\w+)\s+(\S+)\s+-\s?(.*)$",
    )
    .expect("line grammar is a valid regex")
});

/// Stateless parser for the fixed line grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser;

impl LineParser {
    /// Creates a new line parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses one raw line.
    ///
    /// Lines outside the grammar yield a `TRACE` entry whose message is the
    /// whole line.
    #[must_use]
    pub fn parse(&self, raw_line: &str, line_number: usize) -> LogEntry {
        let Some(caps) = LINE_GRAMMAR.captures(raw_line) else {
            return LogEntry::unstructured(raw_line, line_number);
        };

        let field = |i: usize| caps.get(i).map(|m| m.as_str().to_string());

        LogEntry {
            raw_line: raw_line.to_string(),
            line_number,
            timestamp: field(1),
            thread: field(2),
            level: field(3).unwrap_or_default(),
            logger: field(4),
            message: field(5).unwrap_or_default(),
        }
    }

    /// Parses consecutive lines, numbering them from 1.
    pub fn parse_all<'a, I>(&self, lines: I) -> Vec<LogEntry>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| self.parse(line, i + 1))
            .collect()
    }
}
