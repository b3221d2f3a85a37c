//! Real-time log tailing over WebSocket.
//!
//! A [`Session`] follows the log stream of one remote process: it derives the
//! stream endpoint from a [`ConnectionConfig`], keeps the connection alive
//! with heartbeat pings, reconnects with linear backoff after abnormal
//! closures, and collects decoded log lines into a bounded [`LogBuffer`].
//!
//! ```no_run
//! use logstream::{ConnectionConfig, Session, SessionEvent, WsConnector};
//!
//! # async fn run() {
//! let config = ConnectionConfig::new("https://ops.example.com", "api-worker");
//! let session = Session::spawn(config, WsConnector);
//! let mut events = session.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let SessionEvent::Log(entry) = event {
//!         println!("[{}] {}", entry.source_process, entry.message);
//!     }
//! }
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod transport;

pub use buffer::{LogBuffer, LogEntry};
pub use config::{ConfigError, ConnectionConfig, LogFilter};
pub use frames::LogStream;
pub use session::{ConnectionState, Session, SessionError, SessionEvent, Status};
pub use transport::{Connection, Connector, TransportError, TransportEvent, WsConnector};
