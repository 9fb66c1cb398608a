//! Error types for the log tailing engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading, searching or streaming logs.
#[derive(Debug, Error)]
pub enum LogTailError {
    /// A filename tried to escape the log root.
    ///
    /// Carries the rejected input, never the resolved path.
    #[error("access denied: {0}")]
    SecurityViolation(String),

    /// The requested file is not present in the log directory.
    #[error("file not found: {0}")]
    NotFound(String),

    /// A read, seek or decompression failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured log directory does not exist.
    #[error("log directory missing: {}", .0.display())]
    ConfigurationMissing(PathBuf),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// The filesystem watch could not be registered.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A push message could not be handed to a subscriber.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl LogTailError {
    /// Returns true if this error is a path traversal attempt.
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::SecurityViolation(_))
    }

    /// Text safe to hand back to an untrusted caller.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::SecurityViolation(_) => "access denied".to_string(),
            Self::NotFound(name) => format!("file not found: {name}"),
            Self::Io(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for log tailing operations.
pub type Result<T> = std::result::Result<T, LogTailError>;
