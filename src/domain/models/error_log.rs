//! Error log entries and the capped buffer that holds them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionId;

/// Retention cap of the error log.
pub const ERROR_LOG_CAPACITY: usize = 100;

/// One terminal failure. Entries are appended and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    /// When the failure was recorded
    pub timestamp: DateTime<Utc>,

    /// Zero-based index of the failed item (the synthesis run uses the item count)
    pub item_index: usize,

    /// `Query N failed: <reason>`
    pub message: String,

    /// Last session used by the item, if one was ever created
    pub session_ref: Option<SessionId>,
}

impl ErrorLogEntry {
    /// Entry stamped with the current time.
    pub fn new(item_index: usize, message: impl Into<String>, session_ref: Option<SessionId>) -> Self {
        Self {
            timestamp: Utc::now(),
            item_index,
            message: message.into(),
            session_ref,
        }
    }
}

/// Append-only buffer with oldest-first eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogBuffer {
    capacity: usize,
    entries: VecDeque<ErrorLogEntry>,
}

impl Default for ErrorLogBuffer {
    fn default() -> Self {
        Self::with_capacity(ERROR_LOG_CAPACITY)
    }
}

impl ErrorLogBuffer {
    /// Capacity is clamped to `1..=ERROR_LOG_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, ERROR_LOG_CAPACITY);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild from stored entries, keeping only the newest `capacity`.
    pub fn from_entries(capacity: usize, entries: impl IntoIterator<Item = ErrorLogEntry>) -> Self {
        let mut buffer = Self::with_capacity(capacity);
        for entry in entries {
            buffer.push(entry);
        }
        buffer
    }

    /// Append an entry, returning the evicted oldest entry when full.
    pub fn push(&mut self, entry: ErrorLogEntry) -> Option<ErrorLogEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum entries retained.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorLogEntry> {
        self.entries.iter()
    }

    /// Owned copy, oldest first.
    pub fn to_vec(&self) -> Vec<ErrorLogEntry> {
        self.entries.iter().cloned().collect()
    }
}
