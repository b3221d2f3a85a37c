//! Bounded, arrival-ordered log storage.
//!
//! The buffer never reorders or deduplicates. Once it holds `capacity`
//! entries, each push evicts the oldest one. Stream filtering happens at read
//! time so switching the view never loses entries.

use std::collections::VecDeque;

use frames::{LogFrame, LogStream};
use serde::Serialize;

use crate::config::LogFilter;

/// One received log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub stream: LogStream,
    pub message: String,
    pub source_process: String,
    pub timestamp: String,
}

impl From<LogFrame> for LogEntry {
    fn from(frame: LogFrame) -> Self {
        Self {
            stream: frame.log_type,
            message: frame.message,
            source_process: frame.process,
            timestamp: frame.timestamp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an entry, returning the one evicted to make room, if any.
    pub fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries visible through `filter`, oldest first.
    pub fn view(&self, filter: LogFilter) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |entry| filter.admits(entry.stream))
    }

    /// Owned copy of [`LogBuffer::view`].
    #[must_use]
    pub fn snapshot(&self, filter: LogFilter) -> Vec<LogEntry> {
        self.view(filter).cloned().collect()
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
