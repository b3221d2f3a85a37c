//! Session configuration and stream endpoint derivation.

use std::str::FromStr;
use std::time::Duration;

use frames::LogStream;

pub const DEFAULT_RESOURCE_KIND: &str = "pm2";
pub const DEFAULT_BUFFER_CAPACITY: usize = 5000;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 2000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing base URL or service name")]
    MissingEndpoint,
    #[error("unsupported base URL scheme: {0}")]
    InvalidBaseUrl(String),
    #[error("unknown log type '{0}' (expected 'both', 'out' or 'error')")]
    InvalidLogFilter(String),
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Which log streams the server should send and the buffer view should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFilter {
    #[default]
    Both,
    Out,
    Error,
}

impl LogFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::Out => "out",
            Self::Error => "error",
        }
    }

    /// Whether an entry from `stream` is visible through this filter.
    #[must_use]
    pub fn admits(self, stream: LogStream) -> bool {
        match self {
            Self::Both => true,
            Self::Out => stream == LogStream::Out,
            Self::Error => stream == LogStream::Error,
        }
    }
}

impl std::fmt::Display for LogFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFilter {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "both" => Ok(Self::Both),
            "out" => Ok(Self::Out),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::InvalidLogFilter(other.to_owned())),
        }
    }
}

/// Everything one log stream session needs. Fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// HTTP(S) or WS(S) address of the log service, e.g. `https://ops.example.com/`.
    pub base_url: String,
    /// Name of the remote process whose logs are streamed.
    pub service: String,
    /// First path segment of the stream endpoint.
    pub resource_kind: String,
    pub log_filter: LogFilter,
    /// Maximum number of entries kept in memory.
    pub buffer_capacity: usize,
    pub heartbeat_interval: Duration,
    pub max_reconnect_attempts: u32,
    /// Retry `n` waits `backoff_base * n`.
    pub backoff_base: Duration,
    pub connect_timeout: Duration,
    /// Connect on start and allow automatic reconnects.
    pub enabled: bool,
}

impl ConnectionConfig {
    /// Config for `service` at `base_url` with every other knob at its default.
    pub fn new(base_url: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            service: service.into(),
            resource_kind: DEFAULT_RESOURCE_KIND.to_owned(),
            log_filter: LogFilter::Both,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_log_filter(mut self, log_filter: LogFilter) -> Self {
        self.log_filter = log_filter;
        self
    }

    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self.backoff_base = backoff_base;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check the config before any connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: a blank endpoint or service, a zero
    /// buffer capacity, or a zero heartbeat/connect timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() || self.service.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("heartbeat interval"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("connect timeout"));
        }
        Ok(())
    }

    /// Derive the WebSocket endpoint for this session.
    ///
    /// `http` becomes `ws`, `https` becomes `wss`, one trailing slash is
    /// dropped, and `/{resource_kind}/{service}?type={filter}` is appended.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config is invalid or the base URL uses a
    /// scheme other than `http`, `https`, `ws` or `wss`.
    pub fn endpoint_url(&self) -> Result<String, ConfigError> {
        self.validate()?;

        let base = self.base_url.trim();
        let ws_base = if let Some(rest) = base.strip_prefix("http:") {
            format!("ws:{rest}")
        } else if let Some(rest) = base.strip_prefix("https:") {
            format!("wss:{rest}")
        } else if base.starts_with("ws:") || base.starts_with("wss:") {
            base.to_owned()
        } else {
            return Err(ConfigError::InvalidBaseUrl(base.to_owned()));
        };
        let ws_base = ws_base.strip_suffix('/').unwrap_or(&ws_base);

        Ok(format!(
            "{ws_base}/{}/{}?type={}",
            self.resource_kind,
            self.service.trim(),
            self.log_filter
        ))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
