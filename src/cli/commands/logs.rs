//! `logs`: view or clear the persistent error log.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::app::build_error_log;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, ErrorLogEntry};

/// Inspect or clear the error log
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Log action
    #[command(subcommand)]
    pub command: LogsCommands,
}

/// `logs` actions.
#[derive(Subcommand, Debug)]
pub enum LogsCommands {
    /// Show the most recent entries, newest first
    Show {
        /// Maximum number of entries
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Remove every entry
    Clear,
}

/// Page of error log entries, newest first.
#[derive(Debug, Serialize)]
pub struct LogListOutput {
    /// Entries shown
    pub entries: Vec<ErrorLogEntry>,
    /// Entries in the whole log
    pub total: usize,
}

impl LogListOutput {
    /// Newest `limit` entries of an oldest-first log.
    pub fn newest(mut entries: Vec<ErrorLogEntry>, limit: usize) -> Self {
        let total = entries.len();
        entries.reverse();
        entries.truncate(limit);
        Self { entries, total }
    }
}

impl CommandOutput for LogListOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No errors logged.".to_string();
        }
        format!(
            "Showing {} of {} entries:\n{}",
            self.entries.len(),
            self.total,
            TableFormatter::new().format_error_log(&self.entries)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Outcome of a mutating `logs` action.
#[derive(Debug, Serialize)]
pub struct LogActionOutput {
    /// True when the action completed
    pub success: bool,
    /// What happened
    pub message: String,
}

impl CommandOutput for LogActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run a `logs` action.
pub async fn execute(args: LogsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let log = build_error_log(config);

    match args.command {
        LogsCommands::Show { limit } => {
            let entries = log.entries().await.context("Failed to read the error log")?;
            output(&LogListOutput::newest(entries, limit), json_mode);
        }
        LogsCommands::Clear => {
            log.clear().await.context("Failed to clear the error log")?;
            output(
                &LogActionOutput {
                    success: true,
                    message: "Error log cleared.".to_string(),
                },
                json_mode,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_with_limit() {
        let entries = (0..5)
            .map(|i| ErrorLogEntry::new(i, format!("failure {i}"), None))
            .collect();

        let listed = LogListOutput::newest(entries, 2);

        assert_eq!(listed.total, 5);
        let indexes: Vec<_> = listed.entries.iter().map(|e| e.item_index).collect();
        assert_eq!(indexes, vec![4, 3]);
    }

    #[test]
    fn test_empty_log_message() {
        let listed = LogListOutput::newest(Vec::new(), 20);
        assert_eq!(listed.to_human(), "No errors logged.");
    }
}
