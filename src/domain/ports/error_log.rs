//! Error log port - persistent record of terminal failures.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::ErrorLogEntry;

/// Append-only store of terminal failures, capped with oldest-first eviction.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    /// Add an entry, evicting the oldest when full.
    async fn append(&self, entry: ErrorLogEntry) -> Result<()>;

    /// All retained entries, oldest first.
    async fn entries(&self) -> Result<Vec<ErrorLogEntry>>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;
}
