//! # logtail
//!
//! Tailing, search and live streaming over a directory of plain-text and
//! gzip-compressed rotated log files.
//!
//! This crate provides:
//!
//! - [`PathResolver`] — Traversal-safe filename resolution under the log root
//! - [`FileRegistry`] — Listing of current, rotated and compressed files
//! - [`LineParser`] — `TIMESTAMP [THREAD] LEVEL LOGGER - MESSAGE` parsing
//! - [`TailReader`] — Last-N-lines reads without loading whole files
//! - [`SearchEngine`] — Filtered tail and full-scan search, plus downloads
//! - [`LiveTailBroadcaster`] — Push of newly appended lines to subscribers
//! - [`PushSink`] — Seam to the push transport, with [`ChannelPushSink`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use logtail::{LogSearchCriteria, LogTailConfig, SearchEngine};
//!
//! let config = LogTailConfig::new("/var/log/app").with_active_file("application.log");
//! let engine = SearchEngine::new(&config);
//!
//! let result = engine.tail(&LogSearchCriteria::new().with_level("ERROR").with_lines(20));
//! for entry in &result.entries {
//!     println!("{} {}", entry.level, entry.message);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod parser;
pub mod path;
pub mod registry;
pub mod search;
pub mod sink;
pub mod tail;
pub mod types;

// Re-export main types
pub use broadcaster::{BroadcasterState, LiveTailBroadcaster};
pub use config::LogTailConfig;
pub use error::{LogTailError, Result};
pub use parser::LineParser;
pub use path::PathResolver;
pub use registry::FileRegistry;
pub use search::{LogDownload, SearchEngine};
pub use sink::{ChannelPushSink, PushSink};
pub use tail::{open_lines, LineIter, TailReader};
pub use types::{
    LogEntry, LogFileDescriptor, LogPushMessage, LogSearchCriteria, PushMessageKind,
    SearchResult, SessionId,
};
