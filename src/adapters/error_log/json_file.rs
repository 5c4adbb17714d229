//! Error log persisted as a JSON array on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::models::{ErrorLogBuffer, ErrorLogConfig, ErrorLogEntry};
use crate::domain::ports::ErrorLog;

/// File-backed error log. Every append rewrites the file with at most
/// `capacity` entries, oldest first.
#[derive(Debug)]
pub struct JsonFileErrorLog {
    path: PathBuf,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl JsonFileErrorLog {
    /// Log stored at `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
            write_lock: Mutex::new(()),
        }
    }

    /// Log from the `error_log` config section.
    pub fn from_config(config: &ErrorLogConfig) -> Self {
        Self::new(config.path.clone(), config.capacity)
    }

    /// Location of the JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<ErrorLogBuffer> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ErrorLogBuffer::with_capacity(self.capacity))
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let entries: Vec<ErrorLogEntry> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(ErrorLogBuffer::from_entries(self.capacity, entries))
    }

    async fn store(&self, buffer: &ErrorLogBuffer) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(&buffer.to_vec()).context("Failed to encode error log")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl ErrorLog for JsonFileErrorLog {
    async fn append(&self, entry: ErrorLogEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut buffer = self.load().await?;
        if let Some(evicted) = buffer.push(entry) {
            debug!(timestamp = %evicted.timestamp, "Evicted oldest error log entry");
        }
        self.store(&buffer).await
    }

    async fn entries(&self) -> Result<Vec<ErrorLogEntry>> {
        let _guard = self.write_lock.lock().await;
        Ok(self.load().await?.to_vec())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store(&ErrorLogBuffer::with_capacity(self.capacity)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileErrorLog::new(dir.path().join("errors.json"), 100);
        assert!(log.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("errors.json");

        let log = JsonFileErrorLog::new(&path, 100);
        log.append(ErrorLogEntry::new(0, "Query 1 failed: timeout", None))
            .await
            .unwrap();
        log.append(ErrorLogEntry::new(2, "Query 3 failed: rejected", None))
            .await
            .unwrap();

        let reopened = JsonFileErrorLog::new(&path, 100);
        let entries = reopened.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message, "Query 3 failed: rejected");
    }

    #[tokio::test]
    async fn test_cap_applies_on_disk() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileErrorLog::new(dir.path().join("errors.json"), 3);
        for i in 0..5 {
            log.append(ErrorLogEntry::new(i, format!("failure {i}"), None))
                .await
                .unwrap();
        }

        let entries = log.entries().await.unwrap();
        let indexes: Vec<_> = entries.iter().map(|e| e.item_index).collect();
        assert_eq!(indexes, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_clear_empties_file() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileErrorLog::new(dir.path().join("errors.json"), 100);
        log.append(ErrorLogEntry::new(0, "failure", None)).await.unwrap();

        log.clear().await.unwrap();

        assert!(log.entries().await.unwrap().is_empty());
        assert!(log.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("errors.json");
        std::fs::write(&path, "not json").unwrap();

        let log = JsonFileErrorLog::new(&path, 100);
        let err = log.entries().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
