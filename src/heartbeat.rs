//! Keep-alive ticker for an open connection.
//!
//! The session holds at most one `Heartbeat` and only while the connection is
//! open; dropping it stops the ticks. A missing pong is not treated as a
//! failure here. Dead connections are noticed through the transport's own
//! close event.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug)]
pub struct Heartbeat {
    interval: Interval,
}

impl Heartbeat {
    /// Start ticking every `period`, first tick one full period from now.
    ///
    /// `period` must be non-zero; `ConnectionConfig::validate` enforces this.
    #[must_use]
    pub fn start(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next tick. Cancel-safe.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Wait for the next tick of `heartbeat`, or forever if none is running.
pub async fn next_beat(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat {
        Some(heartbeat) => heartbeat.tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "heartbeat_test.rs"]
mod tests;
