use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use assess_proto::{decode_frame, AssessEvent, RunRecord};
use futures_util::future::BoxFuture;
use run_store::RunStore;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, trace, warn};

use super::state::{CloseReason, Counters, SessionState};
use super::{EventCallback, SessionOptions, Shared};
use crate::transport::{Connector, Link, LinkEvent, TransportError};

/// Text frame sent on the keep-alive interval while open.
pub(crate) const KEEPALIVE_FRAME: &str = "ping";

const CONNECTION_ERROR: &str = "WebSocket connection error";

pub(crate) enum Command {
    Bind {
        job_id: Option<String>,
        ack: oneshot::Sender<()>,
    },
    Send(String),
    Reset {
        ack: oneshot::Sender<()>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

struct BoundJob {
    id: String,
    /// Unix ms of the first event seen for this job.
    created_at: Option<i64>,
}

type PendingConnect = BoxFuture<'static, Result<Link, TransportError>>;

pub(crate) struct Driver {
    options: SessionOptions,
    connector: Arc<dyn Connector>,
    store: Arc<dyn RunStore>,
    on_event: Option<EventCallback>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    job: Option<BoundJob>,
    attempts: u32,
    link: Option<Link>,
    /// Set once the open link has carried a frame or outlived one keep-alive
    /// period. Only a proven link resets the retry budget.
    proven: bool,
    connecting: Option<PendingConnect>,
    retry_at: Option<Pin<Box<Sleep>>>,
    keepalive: Option<Interval>,
}

impl Driver {
    pub(crate) fn new(
        options: SessionOptions,
        connector: Arc<dyn Connector>,
        store: Arc<dyn RunStore>,
        on_event: Option<EventCallback>,
        shared: Arc<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            options,
            connector,
            store,
            on_event,
            shared,
            commands,
            job: None,
            attempts: 0,
            link: None,
            proven: false,
            connecting: None,
            retry_at: None,
            keepalive: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.teardown();
                        break;
                    }
                },
                result = poll_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.handle_connect(result);
                }
                event = next_link_event(&mut self.link) => self.handle_link_event(event),
                _ = wait_retry(&mut self.retry_at) => {
                    self.retry_at = None;
                    self.start_connect();
                }
                _ = next_tick(&mut self.keepalive) => {
                    self.mark_proven();
                    if let Some(link) = &self.link {
                        if let Err(err) = link.send_text(KEEPALIVE_FRAME) {
                            trace!(target: "assess::session", error = %err, "keep-alive send failed");
                        }
                    }
                }
            }
        }
        debug!(target: "assess::session", "session driver stopped");
    }

    /// Returns `false` once the driver should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Bind { job_id, ack } => {
                self.bind(job_id);
                let _ = ack.send(());
            }
            Command::Send(raw) => match &self.link {
                Some(link) => {
                    if let Err(err) = link.send_text(raw) {
                        trace!(target: "assess::session", error = %err, "raw send failed");
                    }
                }
                None => trace!(target: "assess::session", "raw send with no open transport"),
            },
            Command::Reset { ack } => {
                self.shared.events.write().clear();
                *self.shared.last_error.write() = None;
                self.attempts = 0;
                debug!(target: "assess::session", "session reset");
                let _ = ack.send(());
            }
            Command::Shutdown { ack } => {
                self.teardown();
                self.set_state(SessionState::Closed(CloseReason::Intentional));
                let _ = ack.send(());
                return false;
            }
        }
        true
    }

    fn bind(&mut self, job_id: Option<String>) {
        let had_transport = self.teardown();
        if had_transport {
            self.set_state(SessionState::Closed(CloseReason::Intentional));
        }

        let Some(job_id) = job_id else {
            if let Some(job) = self.job.take() {
                debug!(target: "assess::session", job_id = %job.id, "session unbound");
            }
            *self.shared.job_id.write() = None;
            self.attempts = 0;
            self.set_state(SessionState::Idle);
            return;
        };

        let changed = self.job.as_ref().map(|job| job.id.as_str()) != Some(job_id.as_str());
        if changed {
            if self.options.clear_on_new_job {
                self.shared.events.write().clear();
            }
            *self.shared.last_error.write() = None;
            self.job = Some(BoundJob {
                id: job_id.clone(),
                created_at: None,
            });
            *self.shared.job_id.write() = Some(job_id.clone());
        }
        self.attempts = 0;
        info!(target: "assess::session", job_id = %job_id, changed, "binding session");
        self.start_connect();
    }

    fn start_connect(&mut self) {
        let Some(job) = &self.job else {
            return;
        };
        let url = self.options.stream_url(&job.id);
        debug!(target: "assess::session", url = %url, attempt = self.attempts, "connecting");
        Counters::bump(&self.shared.counters.connects_started);
        self.set_state(SessionState::Connecting {
            attempt: self.attempts,
        });
        let connector = self.connector.clone();
        self.connecting = Some(Box::pin(async move { connector.connect(&url).await }));
    }

    fn handle_connect(&mut self, result: Result<Link, TransportError>) {
        match result {
            Ok(link) => {
                self.link = Some(link);
                self.proven = false;
                self.shared.connected.send_replace(true);
                let period = self.options.keepalive_interval;
                if !period.is_zero() {
                    let mut ticker = interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.keepalive = Some(ticker);
                }
                self.set_state(SessionState::Open);
            }
            Err(err) => {
                warn!(target: "assess::session", error = %err, "stream handshake failed");
                *self.shared.last_error.write() = Some(CONNECTION_ERROR.to_owned());
                self.on_closed(CloseReason::Error);
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Frame(text) => {
                self.mark_proven();
                self.accept_frame(&text);
            }
            LinkEvent::Closed => {
                debug!(target: "assess::session", "stream closed by peer");
                self.on_closed(CloseReason::Clean);
            }
            LinkEvent::Failed(reason) => {
                warn!(target: "assess::session", %reason, "stream transport error");
                *self.shared.last_error.write() = Some(CONNECTION_ERROR.to_owned());
                self.on_closed(CloseReason::Error);
            }
        }
    }

    fn accept_frame(&mut self, text: &str) {
        let event = match decode_frame(text) {
            Ok(event) => event,
            Err(err) => {
                Counters::bump(&self.shared.counters.frames_dropped);
                debug!(target: "assess::session", error = %err, len = text.len(), "dropping frame");
                return;
            }
        };

        let created_at = self.created_at(event.job_id());
        let record = {
            let mut log = self.shared.events.write();
            log.push(event.clone());
            let job_events: Vec<AssessEvent> = log
                .iter()
                .filter(|logged| logged.job_id() == event.job_id())
                .cloned()
                .collect();
            RunRecord::from_events(event.job_id(), created_at, &job_events)
        };
        self.store.upsert(record);

        if let Some(callback) = &self.on_event {
            callback(&event);
        }
        trace!(
            target: "assess::session",
            job_id = %event.job_id(),
            kind = event.kind().as_str(),
            "event accepted"
        );
        Counters::bump(&self.shared.counters.frames_accepted);
        let _ = self.shared.fanout.send(event);
    }

    fn mark_proven(&mut self) {
        if self.proven || self.link.is_none() {
            return;
        }
        self.proven = true;
        if self.attempts > 0 {
            debug!(target: "assess::session", attempts = self.attempts, "retry budget restored");
        }
        self.attempts = 0;
        *self.shared.last_error.write() = None;
    }

    /// Creation time for `job_id`, fixed at its first event.
    fn created_at(&mut self, job_id: &str) -> i64 {
        match &mut self.job {
            Some(job) if job.id == job_id => *job.created_at.get_or_insert_with(now_millis),
            _ => now_millis(),
        }
    }

    fn on_closed(&mut self, reason: CloseReason) {
        self.drop_transport();

        if !self.options.auto_reconnect {
            self.set_state(SessionState::Closed(reason));
            return;
        }
        if self.attempts < self.options.reconnect_attempts {
            self.attempts += 1;
            let delay = self.options.backoff(self.attempts);
            debug!(
                target: "assess::session",
                attempt = self.attempts,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            Counters::bump(&self.shared.counters.reconnects_scheduled);
            self.retry_at = Some(Box::pin(sleep(delay)));
            self.set_state(SessionState::Closed(reason));
        } else {
            warn!(
                target: "assess::session",
                attempts = self.attempts,
                "reconnect attempts exhausted"
            );
            self.set_state(SessionState::Exhausted);
        }
    }

    /// Drops everything live without touching the retry path. Returns whether
    /// anything was torn down.
    fn teardown(&mut self) -> bool {
        let had_transport =
            self.link.is_some() || self.connecting.is_some() || self.retry_at.is_some();
        self.retry_at = None;
        self.drop_transport();
        had_transport
    }

    fn drop_transport(&mut self) {
        self.link = None;
        self.proven = false;
        self.connecting = None;
        self.keepalive = None;
        self.shared.connected.send_replace(false);
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.shared.state.send_replace(state);
        if previous != state {
            trace!(target: "assess::session", from = %previous, to = %state, "state change");
        }
    }
}

async fn poll_connect(connecting: &mut Option<PendingConnect>) -> Result<Link, TransportError> {
    match connecting {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn next_link_event(link: &mut Option<Link>) -> LinkEvent {
    match link {
        Some(link) => link.next_event().await,
        None => pending().await,
    }
}

async fn wait_retry(retry_at: &mut Option<Pin<Box<Sleep>>>) {
    match retry_at {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
