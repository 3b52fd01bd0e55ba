use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why the last link went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Remote close or end of stream.
    Clean,
    /// Handshake failure or transport error.
    Error,
    /// Torn down locally by a rebind or shutdown; never retried.
    Intentional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// `attempt` is 0 for the first connection after a bind.
    Connecting { attempt: u32 },
    Open,
    Closed(CloseReason),
    /// Retry budget spent; only a new bind reconnects.
    Exhausted,
}

impl SessionState {
    pub fn is_open(self) -> bool {
        matches!(self, SessionState::Open)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Connecting { attempt: 0 } => f.write_str("connecting"),
            SessionState::Connecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            SessionState::Open => f.write_str("open"),
            SessionState::Closed(CloseReason::Clean) => f.write_str("closed"),
            SessionState::Closed(CloseReason::Error) => f.write_str("closed (error)"),
            SessionState::Closed(CloseReason::Intentional) => f.write_str("closed (local)"),
            SessionState::Exhausted => f.write_str("gave up reconnecting"),
        }
    }
}

/// Point-in-time counters for one session manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_accepted: u64,
    pub frames_dropped: u64,
    pub connects_started: u64,
    pub reconnects_scheduled: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) frames_accepted: AtomicU64,
    pub(crate) frames_dropped: AtomicU64,
    pub(crate) connects_started: AtomicU64,
    pub(crate) reconnects_scheduled: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            connects_started: self.connects_started.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
        }
    }
}
