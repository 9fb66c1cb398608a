//! Live tailing of the active log file to push subscribers.
//!
//! Two background tasks feed the same broadcast pass:
//! - an event loop driven by filesystem modify events on the log directory
//! - a polling loop on a fixed delay, as a backstop for missed or coalesced
//!   events
//!
//! Each pass reads the bytes appended since the stored offset, parses at most
//! `max_batch_lines` complete lines and pushes them as one message to every
//! subscriber. The offset then advances to the end of the last line pushed,
//! so a burst larger than one batch drains over the following passes.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::LogTailConfig;
use crate::error::{LogTailError, Result};
use crate::parser::LineParser;
use crate::path::PathResolver;
use crate::sink::PushSink;
use crate::tail::decode_line;
use crate::types::{LogPushMessage, SessionId};

/// Lifecycle state of the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcasterState {
    /// No background task is running.
    Stopped,
    /// The event and polling loops are active.
    Running,
}

/// Handles owned while the loops run.
struct RunningTasks {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// State shared between the public handle and the background loops.
struct Shared {
    resolver: PathResolver,
    parser: LineParser,
    active_file: String,
    max_batch_lines: usize,
    poll_interval: Duration,
    watch_timeout: Duration,
    sink: Arc<dyn PushSink>,
    subscribers: RwLock<HashSet<SessionId>>,
    /// Last broadcast byte position per filename.
    offsets: Mutex<HashMap<String, u64>>,
    /// Serialises passes so both loops never read the same range.
    pass_lock: Mutex<()>,
}

/// Streams newly appended lines of the active log file to subscribers.
pub struct LiveTailBroadcaster {
    shared: Arc<Shared>,
    running: Mutex<Option<RunningTasks>>,
}

impl std::fmt::Debug for LiveTailBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTailBroadcaster")
            .field("active_file", &self.shared.active_file)
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl LiveTailBroadcaster {
    /// Creates a stopped broadcaster.
    #[must_use]
    pub fn new(config: &LogTailConfig, sink: Arc<dyn PushSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                resolver: PathResolver::new(&config.log_dir),
                parser: LineParser::new(),
                active_file: config.active_file.clone(),
                max_batch_lines: config.max_batch_lines.max(1),
                poll_interval: config.poll_interval(),
                watch_timeout: config.watch_timeout(),
                sink,
                subscribers: RwLock::new(HashSet::new()),
                offsets: Mutex::new(HashMap::new()),
                pass_lock: Mutex::new(()),
            }),
            running: Mutex::new(None),
        }
    }

    /// Starts the event and polling loops.
    ///
    /// Stays [`BroadcasterState::Stopped`] if the log directory is missing or
    /// the filesystem watch cannot be registered; the query path is unaffected.
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> BroadcasterState {
        let mut running = self.running.lock();
        if running.is_some() {
            return BroadcasterState::Running;
        }

        let root = self.shared.resolver.root().to_path_buf();
        if !root.is_dir() {
            let err = LogTailError::ConfigurationMissing(root);
            warn!(error = %err, "live tail disabled");
            return BroadcasterState::Stopped;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watcher = match Self::watch_dir(&root, event_tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!(dir = %root.display(), error = %e, "failed to register filesystem watch, live tail disabled");
                return BroadcasterState::Stopped;
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(event_loop(
                Arc::clone(&self.shared),
                event_rx,
                shutdown_rx.clone(),
                watcher,
            )),
            tokio::spawn(poll_loop(Arc::clone(&self.shared), shutdown_rx)),
        ];
        *running = Some(RunningTasks { shutdown_tx, tasks });

        info!(
            dir = %self.shared.resolver.root().display(),
            file = %self.shared.active_file,
            "live tail started"
        );
        BroadcasterState::Running
    }

    /// Stops both loops and releases the filesystem watch.
    ///
    /// Safe to call repeatedly and on a broadcaster that never started.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        let _ = running.shutdown_tx.send(true);
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "live tail task ended abnormally");
            }
        }
        info!("live tail stopped");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BroadcasterState {
        if self.running.lock().is_some() {
            BroadcasterState::Running
        } else {
            BroadcasterState::Stopped
        }
    }

    /// Registers a subscriber; only content appended from now on is pushed.
    pub fn subscribe(&self, session: SessionId) {
        let shared = &self.shared;
        let _pass = shared.pass_lock.lock();

        let size = shared
            .resolver
            .resolve(&shared.active_file)
            .ok()
            .and_then(|path| fs::metadata(path).ok())
            .map_or(0, |m| m.len());

        if shared.subscribers.write().insert(session.clone()) {
            debug!(session = %session, offset = size, "live tail subscriber added");
        }
        shared.offsets.lock().insert(shared.active_file.clone(), size);
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&self, session: &SessionId) {
        if self.shared.subscribers.write().remove(session) {
            debug!(session = %session, "live tail subscriber removed");
        }
    }

    /// Returns true if the session is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, session: &SessionId) -> bool {
        self.shared.subscribers.read().contains(session)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Last broadcast byte position for a file.
    #[must_use]
    pub fn offset(&self, filename: &str) -> Option<u64> {
        self.shared.offsets.lock().get(filename).copied()
    }

    /// Runs one broadcast pass and returns the number of entries pushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the active file cannot be read.
    pub fn read_and_broadcast_new_lines(&self) -> Result<usize> {
        self.shared.read_and_broadcast_new_lines()
    }

    fn watch_dir(
        root: &Path,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Result<RecommendedWatcher> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(e) => warn!(error = %e, "filesystem watch error"),
        })?;
        watcher.watch(root, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

impl Drop for LiveTailBroadcaster {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.shutdown_tx.send(true);
        }
    }
}

impl Shared {
    fn has_subscribers(&self) -> bool {
        !self.subscribers.read().is_empty()
    }

    fn is_active_file_modified(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Modify(_))
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(OsStr::new(&self.active_file)))
    }

    /// Runs a pass, logging instead of propagating failures.
    fn run_pass(&self, trigger: &'static str) {
        match self.read_and_broadcast_new_lines() {
            Ok(0) => {}
            Ok(pushed) => debug!(trigger, pushed, "broadcast cycle delivered entries"),
            Err(e) => error!(trigger, error = %e, "broadcast cycle failed, skipping"),
        }
    }

    fn read_and_broadcast_new_lines(&self) -> Result<usize> {
        let _pass = self.pass_lock.lock();

        let subscribers: Vec<SessionId> = self.subscribers.read().iter().cloned().collect();
        if subscribers.is_empty() {
            return Ok(0);
        }

        let path = self.resolver.resolve(&self.active_file)?;
        let size = match fs::metadata(&path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut offset = self.offsets.lock().get(&self.active_file).copied().unwrap_or(0);
        if size < offset {
            info!(
                file = %self.active_file,
                previous = offset,
                size,
                "log file shrank, assuming rotation and rereading from the start"
            );
            offset = 0;
            self.offsets.lock().insert(self.active_file.clone(), 0);
        }
        if size == offset {
            return Ok(0);
        }

        let (lines, consumed) = read_complete_lines(&path, offset, size, self.max_batch_lines)?;
        if lines.is_empty() {
            return Ok(0);
        }

        let entries = self.parser.parse_all(lines.iter().map(String::as_str));
        let pushed = entries.len();
        let message = LogPushMessage::new(self.active_file.clone(), entries);

        for session in &subscribers {
            if let Err(e) = self.sink.deliver(session, &message) {
                warn!(session = %session, error = %e, "failed to push log entries");
            }
        }

        self.offsets
            .lock()
            .insert(self.active_file.clone(), offset + consumed);
        Ok(pushed)
    }
}

/// Reads up to `max_lines` newline-terminated lines in `[offset, size)`.
///
/// Returns the decoded lines and the number of bytes they span. A trailing
/// line without its newline is left for a later pass.
fn read_complete_lines(
    path: &Path,
    offset: u64,
    size: u64,
    max_lines: usize,
) -> Result<(Vec<String>, u64)> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file.take(size - offset));

    let mut lines = Vec::new();
    let mut consumed = 0u64;
    let mut buf = Vec::with_capacity(256);

    while lines.len() < max_lines {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 || buf.last() != Some(&b'\n') {
            break;
        }
        consumed += n as u64;
        lines.push(decode_line(&buf));
    }

    Ok((lines, consumed))
}

/// Runs one pass on the blocking pool, off the runtime workers.
async fn run_pass_blocking(shared: &Arc<Shared>, trigger: &'static str) {
    let shared = Arc::clone(shared);
    if let Err(e) = tokio::task::spawn_blocking(move || shared.run_pass(trigger)).await {
        error!(trigger, error = %e, "broadcast cycle task failed");
    }
}

async fn event_loop(
    shared: Arc<Shared>,
    mut events: mpsc::UnboundedReceiver<Event>,
    mut shutdown: watch::Receiver<bool>,
    watcher: RecommendedWatcher,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            received = tokio::time::timeout(shared.watch_timeout, events.recv()) => {
                match received {
                    Err(_) => {}
                    Ok(None) => break,
                    Ok(Some(event)) => {
                        if shared.is_active_file_modified(&event) {
                            run_pass_blocking(&shared, "watch").await;
                        }
                    }
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }
    }
    drop(watcher);
    debug!("live tail event loop exited");
}

async fn poll_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(shared.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if shared.has_subscribers() {
                    run_pass_blocking(&shared, "poll").await;
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }
    }
    debug!("live tail polling loop exited");
}
