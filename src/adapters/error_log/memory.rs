//! In-memory error log.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::models::{ErrorLogBuffer, ErrorLogEntry};
use crate::domain::ports::ErrorLog;

/// Process-local error log.
#[derive(Debug, Default)]
pub struct InMemoryErrorLog {
    buffer: RwLock<ErrorLogBuffer>,
}

impl InMemoryErrorLog {
    /// Empty log holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(ErrorLogBuffer::with_capacity(capacity)),
        }
    }
}

#[async_trait]
impl ErrorLog for InMemoryErrorLog {
    async fn append(&self, entry: ErrorLogEntry) -> Result<()> {
        self.buffer.write().await.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ErrorLogEntry>> {
        Ok(self.buffer.read().await.to_vec())
    }

    async fn clear(&self) -> Result<()> {
        self.buffer.write().await.clear();
        Ok(())
    }
}
