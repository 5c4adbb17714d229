//! Console notifier.

use anyhow::{Context, Result};
use async_trait::async_trait;
use console::{style, Term};
use tracing::info;

use crate::domain::ports::Notifier;

/// Prints notifications as a highlighted line on stderr.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    term: Term,
}

impl ConsoleNotifier {
    /// Notifier writing to standard error.
    pub fn stderr() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::stderr()
    }
}

/// Render a notification line. Styling is dropped when colors are disabled.
pub fn format_notification(title: &str, message: &str) -> String {
    format!("{} {}", style(format!("[{title}]")).for_stderr().red().bold(), message)
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        info!(title, message, "notification");
        self.term
            .write_line(&format_notification(title, message))
            .context("Failed to write notification to terminal")
    }
}
