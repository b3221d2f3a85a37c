//! Transport seam between the session and the socket.
//!
//! DESIGN
//! ======
//! The session only needs four things from a transport: open a connection,
//! send text, close with a code, and receive the next event. `Connector` and
//! `Connection` capture exactly that so tests can drive the session with an
//! in-memory transport. `WsConnector` is the production implementation on top
//! of `tokio-tungstenite`.
//!
//! CLOSE CODES
//! ===========
//! A close frame reports its own code (1005 when it carries none). A stream
//! that ends or errors without a close frame is reported as 1006, matching
//! what browsers surface for dropped connections. The close reply to a
//! server-initiated close is flushed before the close is reported.
//!
//! TLS
//! ===
//! `wss` goes through rustls. The `ring` provider is installed as the process
//! default on first dial when the host has not chosen one.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::crypto::CryptoProvider;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::reconnect::{ABNORMAL_CLOSURE, NO_STATUS_RECEIVED};

/// Upper bound on flushing the reply to a server-initiated close.
const CLOSE_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Something that happened on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text payload from the server.
    Message(String),
    /// The connection is gone. No further events follow.
    Closed { code: u16, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection request itself could not be built (bad URL, bad request).
    #[error("invalid connection request: {0}")]
    Invalid(String),
    /// The request was fine but the server could not be reached or refused
    /// the upgrade.
    #[error("connection failed: {0}")]
    Handshake(String),
    #[error("send failed: {0}")]
    Send(String),
}

impl TransportError {
    /// Whether the connection could not even be created. Such failures are
    /// not retried, unlike network failures during the handshake.
    #[must_use]
    pub fn is_creation_failure(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

/// Opens connections to a stream endpoint.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>, TransportError>;
}

/// One live connection, exclusively owned by the session.
#[async_trait::async_trait]
pub trait Connection: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next event. Must be cancel-safe: the session polls it
    /// inside `select!` alongside its timers.
    async fn recv(&mut self) -> TransportEvent;

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

// =============================================================================
// WEBSOCKET
// =============================================================================

/// [`Connector`] backed by `tokio-tungstenite`; `wss` uses rustls with webpki roots.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        install_crypto_provider();
        let (stream, response) = connect_async(url).await.map_err(classify_connect_error)?;
        debug!(%url, status = %response.status(), "ws: handshake complete");
        Ok(Box::new(WsConnection { stream, peer_close: None }))
    }
}

/// Select rustls' `ring` provider for the process unless one is already set.
fn install_crypto_provider() {
    if CryptoProvider::get_default().is_some() {
        return;
    }
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("tls: crypto provider installed concurrently");
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Close received from the server whose reply may still be unflushed.
    peer_close: Option<(u16, String)>,
}

impl WsConnection {
    /// Push out the close reply tungstenite queued when the close arrived.
    async fn reply_to_close(&mut self) {
        match tokio::time::timeout(CLOSE_REPLY_TIMEOUT, self.stream.flush()).await {
            Ok(Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {}
            Ok(Err(error)) => debug!(%error, "ws: close reply not sent"),
            Err(_elapsed) => debug!("ws: close reply timed out"),
        }
    }
}

#[async_trait::async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        while self.peer_close.is_none() {
            let Some(message) = self.stream.next().await else {
                return TransportEvent::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: String::new(),
                };
            };
            match message {
                Ok(Message::Text(text)) => return TransportEvent::Message(text.as_str().to_owned()),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => return TransportEvent::Message(text.to_owned()),
                    Err(error) => debug!(%error, len = bytes.len(), "ws: dropping non-utf8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    self.peer_close = Some(frame.map_or((NO_STATUS_RECEIVED, String::new()), |frame| {
                        (u16::from(frame.code), frame.reason.as_str().to_owned())
                    }));
                }
                // Protocol pings are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(error) => {
                    debug!(%error, "ws: read failed");
                    return TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: error.to_string(),
                    };
                }
            }
        }

        // Kept in `peer_close` until flushed so a cancelled recv reports it again.
        self.reply_to_close().await;
        let (code, reason) = self.peer_close.take().unwrap_or((NO_STATUS_RECEIVED, String::new()));
        TransportEvent::Closed { code, reason }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(|error| TransportError::Send(error.to_string()))
    }
}

fn classify_connect_error(error: WsError) -> TransportError {
    match error {
        WsError::Url(error) => TransportError::Invalid(error.to_string()),
        WsError::HttpFormat(error) => TransportError::Invalid(error.to_string()),
        other => TransportError::Handshake(other.to_string()),
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
