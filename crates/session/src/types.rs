//! Core identifier types and collaborator interfaces.
//!
//! The multiplexing core talks to the rest of the application only
//! through the traits defined here: an opaque backend that accepts
//! writes, an asynchronous output stream keyed by session id, and a
//! one-way notice channel for side effects (titles, bells, activity).

use alacritty_terminal::grid::Dimensions;
use anyhow::Result;
use settings::BellMode;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier for a backend shell process.
///
/// Cheap to clone; the backing string is shared. The process behind it
/// outlives individual UI attach/detach cycles.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(Arc::from(value.as_str()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// Identity of a mount target. Two containers are the same target iff
/// their ids are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContainerId(Uuid);

impl ContainerId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal grid dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermSize {
    pub columns: usize,
    pub screen_lines: usize,
}

impl TermSize {
    pub fn new(columns: usize, screen_lines: usize) -> Self {
        // A grid smaller than 2x2 breaks alacritty's damage tracking
        Self {
            columns: columns.max(2),
            screen_lines: screen_lines.max(2),
        }
    }
}

impl Default for TermSize {
    fn default() -> Self {
        Self {
            columns: settings::constants::terminal::DEFAULT_COLUMNS,
            screen_lines: settings::constants::terminal::DEFAULT_ROWS,
        }
    }
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.screen_lines
    }

    fn screen_lines(&self) -> usize {
        self.screen_lines
    }

    fn columns(&self) -> usize {
        self.columns
    }
}

/// One-way side-effect command emitted by the core.
///
/// Consumed by an external dispatcher (tab bar, notification service);
/// the core never calls into those subsystems directly.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionNotice {
    /// The shell set a window/tab title (OSC 0/2).
    TitleChanged { session: SessionId, title: String },
    /// The shell reset the title to its default.
    TitleReset { session: SessionId },
    /// The terminal rang the bell; `mode` is the configured behavior.
    Bell { session: SessionId, mode: BellMode },
    /// Output arrived for the session (throttled).
    Activity { session: SessionId },
}

/// A resolved subscription to one session's output stream.
///
/// Dropping the receiver unsubscribes.
pub struct OutputSubscription {
    pub chunks: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Future returned by [`OutputChannel::subscribe`]. Registration is
/// asynchronous and may resolve after the requesting entry has already
/// been disposed; the registry handles that race.
pub type SubscribeFuture = Pin<Box<dyn Future<Output = Result<OutputSubscription>> + Send>>;

/// Inbound byte stream source keyed by session id.
pub trait OutputChannel: Send + Sync {
    fn subscribe(&self, session: &SessionId) -> SubscribeFuture;
}

/// The opaque backend service owning shell processes.
///
/// The core only writes input bytes and requests termination; process
/// spawning and lifetime are the backend's concern.
pub trait SessionBackend: Send + Sync {
    /// Best-effort write of input bytes to the session.
    fn write(&self, session: &SessionId, bytes: &[u8]) -> Result<()>;

    /// Terminate the backend process behind the session.
    fn terminate(&self, session: &SessionId);
}
