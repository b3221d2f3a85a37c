//! Connection manager for one log stream.
//!
//! DESIGN
//! ======
//! `Session` is a handle to a driver task. The driver is the only owner of the
//! live connection, the heartbeat and the reconnect timer, and it `select!`s
//! over four sources:
//! - consumer commands (connect / disconnect / enable / shutdown)
//! - the next transport event (frame or close)
//! - the heartbeat tick
//! - the pending reconnect timer
//!
//! Because every transition runs on that one task, a timer can never fire
//! against a connection that is being torn down: `disconnect` drops both
//! timers before it touches the transport.
//!
//! LIFECYCLE
//! =========
//! Idle → Connecting → Open → Closing → Closed. After an abnormal close the
//! reconnect policy may move Closed → Reconnecting → Connecting. Closed is
//! terminal once retries run out or the consumer disconnected.
//!
//! ERRORS
//! ======
//! Nothing here fails the host process. Config, transport and close errors
//! become the session's last error and a `SessionEvent::Error`; remote error
//! frames become a `SessionEvent::Notice`; undecodable frames are dropped.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use frames::{Inbound, Outbound};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, trace, warn};

use crate::buffer::{LogBuffer, LogEntry};
use crate::config::{ConfigError, ConnectionConfig, LogFilter};
use crate::heartbeat::{self, Heartbeat};
use crate::reconnect::{
    ABNORMAL_CLOSURE, CloseCategory, Decision, Disposition, NORMAL_CLOSURE, ReconnectPolicy, StopReason,
};
use crate::transport::{Connection, Connector, TransportEvent};

/// Capacity of the subscriber event channel. Slow subscribers lag; the buffer
/// stays authoritative.
const EVENT_CAPACITY: usize = 1024;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Reconnecting,
}

impl ConnectionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the session for consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    /// Reconnect attempts since the last successful open.
    pub attempts: u32,
}

impl Status {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to create WebSocket connection: {0}")]
    Transport(String),
    #[error("{message}")]
    Closed { code: u16, message: String },
    #[error("{0}")]
    Remote(String),
}

/// What subscribers see, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    State(ConnectionState),
    Log(LogEntry),
    /// Error frame from the server; the connection stays open.
    Notice(String),
    Error(SessionError),
    /// Reconnect attempts are exhausted; call `connect()` to try again.
    GaveUp { attempts: u32 },
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    SetEnabled(bool),
    Shutdown,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Consumer handle for one log stream session.
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<Status>,
    events: broadcast::Sender<SessionEvent>,
    buffer: Arc<Mutex<LogBuffer>>,
    filter: LogFilter,
    driver: JoinHandle<()>,
}

impl Session {
    /// Spawn the session driver on the current tokio runtime.
    ///
    /// When `config.enabled` is set the driver connects right away.
    pub fn spawn<C>(config: ConnectionConfig, connector: C) -> Self
    where
        C: Connector + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(Status::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let buffer = Arc::new(Mutex::new(LogBuffer::new(config.buffer_capacity)));
        let filter = config.log_filter;

        let driver = Driver {
            policy: ReconnectPolicy::from_config(&config),
            enabled: config.enabled,
            config,
            connector: Box::new(connector),
            commands: command_rx,
            status: status_tx,
            events: events.clone(),
            buffer: Arc::clone(&buffer),
            state: ConnectionState::Idle,
            attempts: 0,
            last_error: None,
            connection: None,
            heartbeat: None,
            reconnect: None,
        };
        let driver = tokio::spawn(driver.run());

        Self { commands, status, events, buffer, filter, driver }
    }

    /// Open the stream. Ignored while already open or connecting.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Close the stream normally and cancel any pending retry.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Enabling connects; disabling disconnects and blocks automatic retries.
    pub fn set_enabled(&self, enabled: bool) {
        self.command(Command::SetEnabled(enabled));
    }

    /// Drop every buffered entry. The connection is not affected.
    pub fn clear_logs(&self) {
        lock(&self.buffer).clear();
    }

    /// Buffered entries visible through the configured log filter.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        lock(&self.buffer).snapshot(self.filter)
    }

    /// Every buffered entry regardless of the filter.
    #[must_use]
    pub fn all_logs(&self) -> Vec<LogEntry> {
        lock(&self.buffer).snapshot(LogFilter::Both)
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.status.borrow().last_error.clone()
    }

    /// Receive events from now on. Earlier events are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    /// Disconnect and wait for the driver task to finish.
    pub async fn shutdown(self) {
        self.command(Command::Shutdown);
        if let Err(error) = self.driver.await {
            warn!(%error, "session: driver task failed");
        }
    }

    fn command(&self, command: Command) {
        if let Err(error) = self.commands.send(command) {
            warn!(command = ?error.0, "session: driver stopped; command ignored");
        }
    }
}

fn lock(buffer: &Mutex<LogBuffer>) -> MutexGuard<'_, LogBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// DRIVER
// =============================================================================

struct Driver {
    config: ConnectionConfig,
    policy: ReconnectPolicy,
    connector: Box<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<Status>,
    events: broadcast::Sender<SessionEvent>,
    buffer: Arc<Mutex<LogBuffer>>,
    state: ConnectionState,
    attempts: u32,
    enabled: bool,
    last_error: Option<String>,
    connection: Option<Box<dyn Connection>>,
    heartbeat: Option<Heartbeat>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        if self.enabled {
            self.open().await;
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.open().await,
                    Some(Command::Disconnect) => self.disconnect().await,
                    Some(Command::SetEnabled(enabled)) => self.set_enabled(enabled).await,
                    Some(Command::Shutdown) | None => {
                        self.disconnect().await;
                        break;
                    }
                },
                event = next_event(&mut self.connection) => self.on_event(event),
                () = heartbeat::next_beat(&mut self.heartbeat) => self.send(Outbound::Ping).await,
                () = reconnect_due(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.open().await;
                }
            }
        }

        debug!(service = %self.config.service, "session: driver stopped");
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    async fn open(&mut self) {
        if matches!(self.state, ConnectionState::Open | ConnectionState::Connecting) {
            debug!(state = %self.state, "session: already connecting or open");
            return;
        }

        self.reconnect = None;
        if let Some(mut stale) = self.connection.take() {
            if let Err(error) = stale.close(NORMAL_CLOSURE, "Reconnecting").await {
                debug!(%error, "ws: failed to close stale connection");
            }
        }

        let url = match self.config.endpoint_url() {
            Ok(url) => url,
            Err(error) => {
                warn!(%error, "session: invalid configuration; not connecting");
                self.fail(SessionError::Config(error));
                return;
            }
        };

        self.set_state(ConnectionState::Connecting);
        info!(%url, attempt = self.attempts, "ws: connecting");

        let opened = tokio::time::timeout(self.config.connect_timeout, self.connector.open(&url)).await;
        match opened {
            Ok(Ok(connection)) => self.on_open(connection),
            Ok(Err(error)) if error.is_creation_failure() => {
                warn!(%error, "ws: could not create connection");
                self.set_state(ConnectionState::Closed);
                self.fail(SessionError::Transport(error.to_string()));
            }
            Ok(Err(error)) => {
                warn!(%error, "ws: handshake failed");
                self.on_closed(ABNORMAL_CLOSURE, &error.to_string());
            }
            Err(_elapsed) => {
                warn!(timeout = ?self.config.connect_timeout, "ws: handshake timed out");
                self.on_closed(ABNORMAL_CLOSURE, "handshake timed out");
            }
        }
    }

    fn on_open(&mut self, connection: Box<dyn Connection>) {
        self.connection = Some(connection);
        self.reconnect = None;
        self.attempts = 0;
        self.last_error = None;
        let heartbeat = Heartbeat::start(self.config.heartbeat_interval);
        debug!(period = ?heartbeat.period(), "ws: heartbeat started");
        self.heartbeat = Some(heartbeat);
        self.set_state(ConnectionState::Open);
        info!(service = %self.config.service, filter = %self.config.log_filter, "ws: connected");
    }

    fn on_closed(&mut self, code: u16, reason: &str) {
        self.heartbeat = None;
        self.connection = None;
        info!(code, %reason, "ws: closed");
        self.set_state(ConnectionState::Closed);

        if let Some(message) = CloseCategory::from_code(code).message() {
            self.fail(SessionError::Closed { code, message });
        }

        match self.policy.decide(Disposition::Remote(code), self.attempts, self.enabled) {
            Decision::Retry { attempt, delay } => {
                self.attempts = attempt;
                self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                info!(attempt, max = self.policy.max_attempts(), ?delay, "ws: reconnect scheduled");
                self.set_state(ConnectionState::Reconnecting);
            }
            Decision::Stop(StopReason::Exhausted { attempts }) => {
                warn!(attempts, "ws: reconnect attempts exhausted");
                self.emit(SessionEvent::GaveUp { attempts });
            }
            Decision::Stop(reason) => debug!(?reason, "ws: not reconnecting"),
        }
    }

    async fn disconnect(&mut self) {
        self.heartbeat = None;
        self.reconnect = None;

        if let Some(mut connection) = self.connection.take() {
            self.set_state(ConnectionState::Closing);
            let closing = tokio::time::timeout(
                self.config.connect_timeout,
                connection.close(NORMAL_CLOSURE, "User disconnected"),
            )
            .await;
            match closing {
                Ok(Ok(())) => {}
                Ok(Err(error)) => debug!(%error, "ws: close failed"),
                Err(_elapsed) => debug!("ws: close timed out"),
            }
            info!(service = %self.config.service, "ws: disconnected");
        }

        self.attempts = 0;
        self.set_state(ConnectionState::Closed);
    }

    async fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.open().await;
        } else {
            self.disconnect().await;
        }
    }

    async fn send(&mut self, frame: Outbound) {
        if self.state != ConnectionState::Open {
            trace!(state = %self.state, "ws: send skipped; not open");
            return;
        }
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if let Err(error) = connection.send(frames::encode_frame(&frame)).await {
            warn!(%error, "ws: send failed");
        }
    }

    // -------------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------------

    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Closed { code, reason } => self.on_closed(code, &reason),
        }
    }

    fn on_message(&mut self, text: &str) {
        let frame = match frames::decode_frame(text) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(%error, "ws: dropping undecodable frame");
                return;
            }
        };

        trace!(kind = frame.kind(), "ws: frame");
        match frame {
            Inbound::Log(log) => {
                let entry = LogEntry::from(log);
                if let Some(evicted) = lock(&self.buffer).push(entry.clone()) {
                    trace!(timestamp = %evicted.timestamp, "buffer: evicted oldest entry");
                }
                self.emit(SessionEvent::Log(entry));
            }
            Inbound::Connected(greeting) => {
                debug!(process = %greeting.process, log_type = %greeting.log_type, "ws: stream attached");
                self.last_error = None;
                self.set_state(ConnectionState::Open);
            }
            Inbound::Pong => trace!("ws: pong"),
            Inbound::Error(remote) => {
                warn!(message = %remote.message, "ws: remote error");
                self.last_error = Some(remote.message.clone());
                self.publish();
                self.emit(SessionEvent::Notice(remote.message));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Outbound state
    // -------------------------------------------------------------------------

    fn set_state(&mut self, state: ConnectionState) {
        let changed = self.state != state;
        self.state = state;
        self.publish();
        if changed {
            debug!(%state, "session: state changed");
            self.emit(SessionEvent::State(state));
        }
    }

    fn fail(&mut self, error: SessionError) {
        self.last_error = Some(error.to_string());
        self.publish();
        self.emit(SessionEvent::Error(error));
    }

    fn publish(&self) {
        let status = Status {
            state: self.state,
            last_error: self.last_error.clone(),
            attempts: self.attempts,
        };
        self.status.send_modify(|current| *current = status);
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("session: no subscribers");
        }
    }
}

async fn next_event(connection: &mut Option<Box<dyn Connection>>) -> TransportEvent {
    match connection {
        Some(connection) => connection.recv().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
