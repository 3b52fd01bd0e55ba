//! Streaming session manager.
//!
//! One [`SessionManager`] follows one job at a time. Commands go over a
//! channel to a single driver task that owns the transport, the reconnect
//! timer, the keep-alive ticker and the retry counter, so every transition
//! happens in one place and in delivery order:
//!
//! ```text
//! Idle -> Connecting -> Open -> Closed(clean | error) -> Connecting ... -> Exhausted
//! ```
//!
//! Decoded events are appended to an in-memory log, folded into a
//! [`RunRecord`](assess_proto::RunRecord) and written through the
//! [`RunStore`].

mod driver;
mod state;

use std::sync::Arc;
use std::time::Duration;

use assess_proto::AssessEvent;
use parking_lot::RwLock;
use run_store::{MemoryRunStore, RunStore};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::STREAM_PATH_TEMPLATE;
use crate::transport::{Connector, WebSocketConnector};

pub use state::{CloseReason, SessionState, SessionStats};

use driver::{Command, Driver};
use state::Counters;

/// Called on the driver task for every accepted event, after the store write.
pub type EventCallback = Arc<dyn Fn(&AssessEvent) + Send + Sync>;

const EVENT_FANOUT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// `ws://` or `wss://` base the path template is appended to.
    pub stream_base: String,
    /// Path with a `{job_id}` placeholder.
    pub path_template: String,
    pub auto_reconnect: bool,
    /// Reconnects allowed after a drop before giving up.
    pub reconnect_attempts: u32,
    /// Attempt `k` waits `k * reconnect_interval`.
    pub reconnect_interval: Duration,
    pub keepalive_interval: Duration,
    /// Clear the event log when the bound job changes.
    pub clear_on_new_job: bool,
}

impl SessionOptions {
    pub fn stream_url(&self, job_id: &str) -> String {
        let path = self.path_template.replace("{job_id}", job_id);
        let base = self.stream_base.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.reconnect_interval.saturating_mul(attempt)
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stream_base: "ws://127.0.0.1:8000".to_string(),
            path_template: STREAM_PATH_TEMPLATE.to_string(),
            auto_reconnect: true,
            reconnect_attempts: 10,
            reconnect_interval: Duration::from_millis(1_500),
            keepalive_interval: Duration::from_secs(20),
            clear_on_new_job: true,
        }
    }
}

/// State the driver publishes and handles read.
pub(crate) struct Shared {
    pub(crate) events: RwLock<Vec<AssessEvent>>,
    pub(crate) last_error: RwLock<Option<String>>,
    pub(crate) job_id: RwLock<Option<String>>,
    pub(crate) connected: watch::Sender<bool>,
    pub(crate) state: watch::Sender<SessionState>,
    pub(crate) fanout: broadcast::Sender<AssessEvent>,
    pub(crate) counters: Counters,
}

impl Shared {
    fn new() -> Self {
        let (connected, _) = watch::channel(false);
        let (state, _) = watch::channel(SessionState::Idle);
        let (fanout, _) = broadcast::channel(EVENT_FANOUT_CAPACITY);
        Self {
            events: RwLock::new(Vec::new()),
            last_error: RwLock::new(None),
            job_id: RwLock::new(None),
            connected,
            state,
            fanout,
            counters: Counters::default(),
        }
    }
}

pub struct SessionBuilder {
    options: SessionOptions,
    connector: Option<Arc<dyn Connector>>,
    store: Option<Arc<dyn RunStore>>,
    on_event: Option<EventCallback>,
}

impl SessionBuilder {
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn on_event(mut self, callback: impl Fn(&AssessEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(callback));
        self
    }

    /// Starts the driver task. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> SessionManager {
        let shared = Arc::new(Shared::new());
        let (commands, rx) = mpsc::unbounded_channel();
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::default()) as Arc<dyn Connector>);
        let store = self
            .store
            .unwrap_or_else(|| MemoryRunStore::new() as Arc<dyn RunStore>);
        let driver = Driver::new(
            self.options,
            connector,
            store,
            self.on_event,
            shared.clone(),
            rx,
        );
        let task = tokio::spawn(driver.run());
        SessionManager {
            commands,
            shared,
            task: Some(task),
        }
    }
}

pub struct SessionManager {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl SessionManager {
    pub fn builder(options: SessionOptions) -> SessionBuilder {
        SessionBuilder {
            options,
            connector: None,
            store: None,
            on_event: None,
        }
    }

    /// Follows `job_id`, or detaches with `None`.
    ///
    /// Any live transport and pending timers are torn down before this
    /// returns. A different job starts from an empty log and a fresh retry
    /// budget; the same job reconnects and keeps its log.
    pub async fn bind(&self, job_id: Option<&str>) {
        let (ack, done) = oneshot::channel();
        let command = Command::Bind {
            job_id: job_id.map(str::to_owned),
            ack,
        };
        if self.commands.send(command).is_ok() {
            let _ = done.await;
        }
    }

    /// Clears the log, the last error and the retry counter. The transport
    /// is left alone.
    pub async fn reset(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Reset { ack }).is_ok() {
            let _ = done.await;
        }
    }

    /// Sends a raw text frame on the live transport, if any. Failures are
    /// ignored.
    pub fn send(&self, raw: impl Into<String>) {
        let _ = self.commands.send(Command::Send(raw.into()));
    }

    /// Snapshot of the event log in arrival order.
    pub fn events(&self) -> Vec<AssessEvent> {
        self.shared.events.read().clone()
    }

    pub fn event_count(&self) -> usize {
        self.shared.events.read().len()
    }

    pub fn connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.read().clone()
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn job_id(&self) -> Option<String> {
        self.shared.job_id.read().clone()
    }

    /// Live feed of accepted events. Slow receivers may lag and skip.
    pub fn subscribe(&self) -> broadcast::Receiver<AssessEvent> {
        self.shared.fanout.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }

    /// Closes the transport, cancels timers and stops the driver.
    pub async fn shutdown(mut self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { ack }).is_ok() {
            let _ = done.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}
