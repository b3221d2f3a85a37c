//! Reconnect decisions and close-code categories.
//!
//! Backoff is linear: retry `n` waits `base * n`. The attempt counter lives in
//! the session; the policy only reads it.

use std::time::Duration;

use crate::config::ConnectionConfig;

pub const NORMAL_CLOSURE: u16 = 1000;
pub const PROTOCOL_ERROR: u16 = 1002;
pub const UNSUPPORTED_DATA: u16 = 1003;
pub const NO_STATUS_RECEIVED: u16 = 1005;
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Human-facing grouping of WebSocket close codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCategory {
    Normal,
    Abnormal,
    Protocol,
    UnsupportedData,
    Other(u16),
}

impl CloseCategory {
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            NORMAL_CLOSURE => Self::Normal,
            ABNORMAL_CLOSURE => Self::Abnormal,
            PROTOCOL_ERROR => Self::Protocol,
            UNSUPPORTED_DATA => Self::UnsupportedData,
            other => Self::Other(other),
        }
    }

    /// Message to surface to the consumer. Normal closures have none.
    #[must_use]
    pub fn message(self) -> Option<String> {
        match self {
            Self::Normal => None,
            Self::Abnormal => Some("Connection closed abnormally".to_owned()),
            Self::Protocol => Some("Protocol error".to_owned()),
            Self::UnsupportedData => Some("Unsupported data".to_owned()),
            Self::Other(code) => Some(format!("Connection closed (code: {code})")),
        }
    }
}

/// Who ended the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The consumer called `disconnect()`.
    User,
    /// The remote side or the network closed it with this code.
    Remote(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    UserInitiated,
    Disabled,
    NormalClosure,
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Schedule retry number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    Stop(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self { max_attempts, backoff_base }
    }

    #[must_use]
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.max_reconnect_attempts, config.backoff_base)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }

    /// Decide what follows a close, given how many retries already ran.
    #[must_use]
    pub fn decide(&self, disposition: Disposition, attempts: u32, enabled: bool) -> Decision {
        let code = match disposition {
            Disposition::User => return Decision::Stop(StopReason::UserInitiated),
            Disposition::Remote(code) => code,
        };
        if !enabled {
            return Decision::Stop(StopReason::Disabled);
        }
        if code == NORMAL_CLOSURE {
            return Decision::Stop(StopReason::NormalClosure);
        }
        if attempts >= self.max_attempts {
            return Decision::Stop(StopReason::Exhausted { attempts });
        }

        let attempt = attempts + 1;
        Decision::Retry {
            attempt,
            delay: self.delay_for(attempt),
        }
    }
}

#[cfg(test)]
#[path = "reconnect_test.rs"]
mod tests;
