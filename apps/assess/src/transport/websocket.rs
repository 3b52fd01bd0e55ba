use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{Connector, Link, LinkEvent, TransportError};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket client carrying JSON text frames.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    handshake_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Link, TransportError> {
        let (ws_stream, _) = timeout(self.handshake_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout(self.handshake_timeout))??;
        debug!(target: "assess::transport", url, "websocket handshake complete");

        let (tx_out, rx_out) = mpsc::unbounded_channel::<String>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<LinkEvent>();
        let pump = tokio::spawn(async move {
            pump_websocket(ws_stream, rx_out, tx_in).await;
        });
        Ok(Link::new(tx_out, rx_in, Some(pump)))
    }
}

async fn pump_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<String>,
    tx_in: mpsc::UnboundedSender<LinkEvent>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx_out.recv().await {
            if let Err(err) = ws_sender.send(Message::Text(text)).await {
                trace!(target: "assess::transport", error = %err, "outbound frame dropped");
                break;
            }
        }
    });

    let terminal = loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                if tx_in.send(LinkEvent::Frame(text)).is_err() {
                    break None;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(target: "assess::transport", ?frame, "server closed websocket");
                break Some(LinkEvent::Closed);
            }
            // Binary, ping and pong frames carry no events.
            Some(Ok(_)) => {}
            Some(Err(err)) => break Some(LinkEvent::Failed(err.to_string())),
            None => break Some(LinkEvent::Closed),
        }
    };
    if let Some(event) = terminal {
        let _ = tx_in.send(event);
    }

    send_task.abort();
    let _ = send_task.await;
}
