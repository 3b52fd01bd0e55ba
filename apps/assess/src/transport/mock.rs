//! Scripted connector for exercising the session state machine without a
//! network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{Connector, Link, LinkEvent, TransportError};

/// What the next `connect` call should do.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Fail the handshake.
    Refuse(String),
    /// Complete the handshake and hand a [`MockPeer`] to the test.
    Accept,
    /// Complete the handshake, then drop the connection straight away.
    AcceptThenClose,
}

/// Server side of an accepted mock link.
pub struct MockPeer {
    pub url: String,
    to_client: mpsc::UnboundedSender<LinkEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MockPeer {
    pub fn send_frame(&self, text: impl Into<String>) -> bool {
        self.to_client.send(LinkEvent::Frame(text.into())).is_ok()
    }

    pub fn close(&self) {
        let _ = self.to_client.send(LinkEvent::Closed);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.to_client.send(LinkEvent::Failed(reason.into()));
    }

    /// Next frame the client sent, or `None` once the client side is gone.
    pub async fn recv_sent(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// True once the client has dropped its end of the link.
    pub fn is_client_gone(&self) -> bool {
        self.to_client.is_closed()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectRecord {
    pub url: String,
    pub at: Instant,
}

/// Connector that follows a script; an exhausted script refuses.
pub struct MockConnector {
    script: Mutex<VecDeque<MockStep>>,
    history: Mutex<Vec<ConnectRecord>>,
    accepted: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (accepted, peers) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            history: Mutex::new(Vec::new()),
            accepted,
        });
        (connector, peers)
    }

    pub fn push(&self, step: MockStep) {
        self.script.lock().push_back(step);
    }

    pub fn push_many(&self, steps: impl IntoIterator<Item = MockStep>) {
        self.script.lock().extend(steps);
    }

    pub fn attempts(&self) -> usize {
        self.history.lock().len()
    }

    pub fn history(&self) -> Vec<ConnectRecord> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        self.history.lock().push(ConnectRecord {
            url: url.to_owned(),
            at: Instant::now(),
        });
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockStep::Refuse("script exhausted".into()));

        match step {
            MockStep::Refuse(reason) => Err(TransportError::Refused(reason)),
            MockStep::Accept | MockStep::AcceptThenClose => {
                let (tx_out, rx_out) = mpsc::unbounded_channel();
                let (tx_in, rx_in) = mpsc::unbounded_channel();
                if matches!(step, MockStep::AcceptThenClose) {
                    let _ = tx_in.send(LinkEvent::Closed);
                } else {
                    let _ = self.accepted.send(MockPeer {
                        url: url.to_owned(),
                        to_client: tx_in,
                        from_client: rx_out,
                    });
                }
                Ok(Link::new(tx_out, rx_in, None))
            }
        }
    }
}
