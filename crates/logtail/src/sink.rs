//! Push delivery seam between the broadcaster and a transport.
//!
//! The broadcaster only knows how to hand a [`LogPushMessage`] to a session;
//! how it reaches the client (WebSocket, SSE, a terminal) is up to the
//! [`PushSink`] implementation.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::{LogTailError, Result};
use crate::types::{LogPushMessage, SessionId};

/// Delivers push messages to individual subscriber sessions.
pub trait PushSink: Send + Sync {
    /// Hands one message to one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session's channel is gone or rejects the message.
    fn deliver(&self, session: &SessionId, message: &LogPushMessage) -> Result<()>;
}

/// In-process sink backed by one unbounded channel per session.
#[derive(Debug, Default)]
pub struct ChannelPushSink {
    channels: RwLock<HashMap<SessionId, mpsc::UnboundedSender<LogPushMessage>>>,
}

impl ChannelPushSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or replaces) the delivery channel for a session.
    pub fn open(&self, session: SessionId) -> mpsc::UnboundedReceiver<LogPushMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.write().insert(session, tx);
        rx
    }

    /// Closes the delivery channel for a session.
    pub fn close(&self, session: &SessionId) {
        self.channels.write().remove(session);
    }

    /// Number of open channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    /// Returns true if no channel is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

impl PushSink for ChannelPushSink {
    fn deliver(&self, session: &SessionId, message: &LogPushMessage) -> Result<()> {
        let channels = self.channels.read();
        let tx = channels
            .get(session)
            .ok_or_else(|| LogTailError::Delivery(format!("no channel for session {session}")))?;
        tx.send(message.clone())
            .map_err(|_| LogTailError::Delivery(format!("channel closed for session {session}")))
    }
}
