//! Notifier port - user-visible failure notifications.

use anyhow::Result;
use async_trait::async_trait;

/// User-visible notification channel. Fire-and-forget from the caller's view:
/// errors are reported back but never fail a batch.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show `message` under `title`.
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}
