//! Frame transports for the assessment stream.
//!
//! A [`Connector`] opens one [`Link`] per URL. A link is a pair of channels
//! pumped by a background task: outbound text frames in, [`LinkEvent`]s out.
//! Dropping the link aborts the pump, which closes the underlying socket.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod mock;
pub mod websocket;

pub use websocket::WebSocketConnector;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("transport closed")]
    Closed,
}

/// Something the remote end did to an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Frame(String),
    /// Orderly close or end of stream.
    Closed,
    /// Protocol or socket failure.
    Failed(String),
}

/// Opens links; implemented by the real WebSocket client and by test doubles.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Link, TransportError>;
}

pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Link {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<LinkEvent>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            pump,
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.outbound
            .send(text.into())
            .map_err(|_| TransportError::Closed)
    }

    /// Next event from the remote end. A pump that went away counts as closed.
    pub async fn next_event(&mut self) -> LinkEvent {
        self.inbound.recv().await.unwrap_or(LinkEvent::Closed)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
