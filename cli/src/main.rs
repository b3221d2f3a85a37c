use std::time::Duration;

use clap::Parser;
use logstream::config::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BUFFER_CAPACITY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HEARTBEAT_SECS,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RESOURCE_KIND,
};
use logstream::{ConfigError, ConnectionConfig, LogEntry, LogFilter, Session, SessionError, SessionEvent, WsConnector};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Session(SessionError),
    #[error("gave up after {0} reconnect attempts")]
    GaveUp(u32),
    #[error("session event stream closed")]
    EventsClosed,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("failed to listen for Ctrl-C: {0}")]
    Signal(std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "logstream", about = "Tail the logs of a remote process over WebSocket")]
struct Cli {
    /// Log service address (http, https, ws or wss).
    #[arg(long, env = "LOGSTREAM_BASE_URL")]
    base_url: String,

    /// Name of the process to follow.
    #[arg(long, env = "LOGSTREAM_SERVICE")]
    service: String,

    /// Which stream to follow: both, out or error.
    #[arg(long, env = "LOGSTREAM_LOG_TYPE", default_value = "both")]
    log_type: LogFilter,

    #[arg(long, env = "LOGSTREAM_RESOURCE_KIND", default_value = DEFAULT_RESOURCE_KIND)]
    resource_kind: String,

    #[arg(long, env = "LOGSTREAM_BUFFER_CAPACITY", default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,

    #[arg(long, env = "LOGSTREAM_HEARTBEAT_SECS", default_value_t = DEFAULT_HEARTBEAT_SECS)]
    heartbeat_secs: u64,

    #[arg(long, env = "LOGSTREAM_MAX_RECONNECT_ATTEMPTS", default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,

    #[arg(long, env = "LOGSTREAM_BACKOFF_BASE_MS", default_value_t = DEFAULT_BACKOFF_BASE_MS)]
    backoff_base_ms: u64,

    #[arg(long, env = "LOGSTREAM_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    /// Print one JSON object per log line instead of `[process] message`.
    #[arg(long, env = "LOGSTREAM_JSON")]
    json: bool,
}

impl Cli {
    fn into_config(self) -> Result<ConnectionConfig, CliError> {
        let mut config = ConnectionConfig::new(self.base_url, self.service)
            .with_log_filter(self.log_type)
            .with_buffer_capacity(self.buffer_capacity)
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_secs))
            .with_reconnect(self.max_reconnect_attempts, Duration::from_millis(self.backoff_base_ms))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        config.resource_kind = self.resource_kind;
        config.endpoint_url()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    init_tracing();
    let cli = Cli::parse();
    let json = cli.json;
    let config = cli.into_config()?;

    // Subscribe before the first connect so no event is missed.
    let session = Session::spawn(config.with_enabled(false), WsConnector);
    let events = session.subscribe();
    session.set_enabled(true);

    let outcome = tokio::select! {
        result = follow(events, json) => result,
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("interrupted; disconnecting");
                Ok(())
            }
            Err(error) => Err(CliError::Signal(error)),
        },
    };

    session.shutdown().await;
    outcome
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print log lines until the session fails for good.
async fn follow(mut events: broadcast::Receiver<SessionEvent>, json: bool) -> Result<(), CliError> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Log(entry)) => println!("{}", render_entry(&entry, json)?),
            Ok(SessionEvent::State(state)) => info!(%state, "session state"),
            Ok(SessionEvent::Notice(message)) => warn!(%message, "server reported an error"),
            Ok(SessionEvent::Error(error @ (SessionError::Config(_) | SessionError::Transport(_)))) => {
                return Err(CliError::Session(error));
            }
            Ok(SessionEvent::Error(error)) => warn!(%error, "connection problem"),
            Ok(SessionEvent::GaveUp { attempts }) => return Err(CliError::GaveUp(attempts)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind; log lines were skipped"),
            Err(RecvError::Closed) => return Err(CliError::EventsClosed),
        }
    }
}

fn render_entry(entry: &LogEntry, json: bool) -> Result<String, CliError> {
    if json {
        return Ok(serde_json::to_string(entry)?);
    }
    Ok(format!("[{}] {}", entry.source_process, entry.message))
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
