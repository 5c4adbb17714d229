//! Log-only notifier.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::domain::ports::Notifier;

/// Notifier that only emits a log event. Used for JSON output and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        warn!(title, "{message}");
        Ok(())
    }
}
