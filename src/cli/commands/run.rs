//! `run`: start a batch from command-line queries and wait for the synthesis.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::info;

use crate::cli::app::App;
use crate::cli::output::{create_spinner, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::domain::errors::BatchError;
use crate::domain::models::query::normalize_queries;
use crate::domain::models::{BatchId, BatchRequest, Config, Item};
use crate::domain::ports::InteractionDriver;
use crate::services::{BatchHandle, BatchReport};

const PROGRESS_REFRESH: Duration = Duration::from_millis(250);

/// Run a batch of queries and synthesize the answers
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Query to ask; repeat the flag for each query
    #[arg(short, long = "query", value_name = "QUERY")]
    pub queries: Vec<String>,

    /// Read queries from a file, one per line ("-" for stdin)
    #[arg(short = 'f', long, value_name = "FILE", conflicts_with = "queries")]
    pub queries_file: Option<PathBuf>,

    /// Ask a single query this many times (2-5)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u8).range(2..=5))]
    pub repeat: Option<u8>,

    /// Integration prompt for the synthesis step (defaults to config)
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Use the scripted driver instead of the configured helper
    #[arg(long)]
    pub dry_run: bool,

    /// Keep the synthesis session open until Ctrl-C
    #[arg(long)]
    pub keep_open: bool,
}

impl RunArgs {
    /// Turn the arguments into a batch request. Validation is left to the
    /// controller so the CLI and control messages share the same rules.
    pub async fn to_request(&self, config: &Config) -> Result<BatchRequest> {
        let prompt = self
            .prompt
            .clone()
            .unwrap_or_else(|| config.default_prompt.clone());

        let queries = match &self.queries_file {
            Some(path) => normalize_queries(&read_input(path).await?),
            None => self.queries.clone(),
        };

        match (self.repeat, queries.as_slice()) {
            (None, _) => Ok(BatchRequest::new(queries, prompt)),
            (Some(count), [query]) => Ok(BatchRequest::repeated(
                query.clone(),
                usize::from(count),
                prompt,
            )),
            (Some(_), _) => bail!("--repeat needs exactly one query, got {}", queries.len()),
        }
    }
}

/// Read a whole file, or stdin when `path` is "-".
pub async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read stdin")?;
        return Ok(text);
    }

    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Synthesis part of a batch result.
#[derive(Debug, Serialize)]
pub struct SynthesisOutput {
    /// Prompt that was submitted
    pub prompt: String,
    /// Synthesized answer
    pub answer: String,
    /// Session the answer was read from
    pub session_id: String,
    /// Attempts made, first included
    pub attempts: u32,
}

/// Result of a finished batch.
#[derive(Debug, Serialize)]
pub struct BatchOutput {
    /// Batch identifier
    pub batch_id: BatchId,
    /// Items with an answer
    pub succeeded: usize,
    /// Items without one
    pub failed: usize,
    /// Terminal item snapshots, index order
    pub items: Vec<Item>,
    /// Present when synthesis succeeded
    pub synthesis: Option<SynthesisOutput>,
    /// Present when it did not
    pub synthesis_error: Option<String>,
}

impl BatchOutput {
    fn from_report(report: &BatchReport) -> Self {
        let batch = &report.batch;
        Self {
            batch_id: batch.id,
            succeeded: batch.succeeded_count(),
            failed: batch.failed_count(),
            items: batch.items.clone(),
            synthesis: Some(SynthesisOutput {
                prompt: report.synthesis.prompt.clone(),
                answer: report.synthesis.answer.clone(),
                session_id: report.synthesis.session.id().to_string(),
                attempts: report.synthesis.attempts,
            }),
            synthesis_error: None,
        }
    }

    fn from_items(batch_id: BatchId, items: Vec<Item>, error: &BatchError) -> Self {
        Self {
            batch_id,
            succeeded: items.iter().filter(|i| i.is_succeeded()).count(),
            failed: items.iter().filter(|i| !i.is_succeeded()).count(),
            items,
            synthesis: None,
            synthesis_error: Some(error.to_string()),
        }
    }
}

impl CommandOutput for BatchOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Batch {}", self.batch_id),
            TableFormatter::new().format_items(&self.items),
            format!("{} succeeded, {} failed", self.succeeded, self.failed),
        ];

        if let Some(synthesis) = &self.synthesis {
            lines.push(format!("\nSynthesis ({} attempt(s)):", synthesis.attempts));
            lines.push(synthesis.answer.clone());
        }
        if let Some(error) = &self.synthesis_error {
            lines.push(format!("\nSynthesis failed: {error}"));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn progress_message(updates: &[watch::Receiver<Item>]) -> String {
    let total = updates.len();
    let (mut succeeded, mut failed) = (0, 0);
    for rx in updates {
        let item = rx.borrow();
        if item.is_succeeded() {
            succeeded += 1;
        } else if item.is_terminal() {
            failed += 1;
        }
    }

    if succeeded + failed == total {
        format!("{succeeded}/{total} answered, synthesizing...")
    } else {
        format!("{succeeded}/{total} answered, {failed} failed")
    }
}

/// Wait for a started batch, render the outcome, and return the report.
///
/// A failed synthesis still prints the item table before the error is
/// returned.
pub async fn follow(mut handle: BatchHandle, json_mode: bool) -> Result<BatchReport> {
    let batch_id = handle.id();
    let updates = handle.item_updates().to_vec();
    let spinner = (!json_mode).then(create_spinner);

    let result = {
        let wait = handle.wait();
        tokio::pin!(wait);
        let mut refresh = tokio::time::interval(PROGRESS_REFRESH);
        loop {
            tokio::select! {
                result = &mut wait => break result,
                _ = refresh.tick() => {
                    if let Some(spinner) = &spinner {
                        spinner.set_message(progress_message(&updates));
                    }
                }
            }
        }
    };

    match result {
        Ok(report) => {
            if let Some(spinner) = &spinner {
                spinner.finish_success(format!("Batch {batch_id} complete"));
            }
            output(&BatchOutput::from_report(&report), json_mode);
            Ok(report)
        }
        Err(err @ BatchError::SynthesisFailed { .. }) => {
            if let Some(spinner) = &spinner {
                spinner.finish_error(format!("Batch {batch_id} synthesis failed"));
            }
            let items = updates.iter().map(|rx| rx.borrow().clone()).collect();
            output(&BatchOutput::from_items(batch_id, items, &err), json_mode);
            Err(err.into())
        }
        Err(err) => {
            if let Some(spinner) = &spinner {
                spinner.finish_error(format!("Batch {batch_id} stopped"));
            }
            Err(err.into())
        }
    }
}

/// Hold the synthesis session until Ctrl-C, then close it.
pub async fn keep_open(driver: &dyn InteractionDriver, report: BatchReport) -> Result<()> {
    let session = report.synthesis.session;
    eprintln!(
        "Synthesis session {} is open; press Ctrl-C to close it.",
        session.id()
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!(session = %session.id(), "closing synthesis session");
    driver
        .destroy_session(session)
        .await
        .context("Failed to close the synthesis session")
}

/// Run a batch and print its result.
pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let request = args.to_request(config).await?;
    let app = App::build(config, args.dry_run, json_mode)?;

    let handle = app
        .controller
        .start_batch(request)
        .context("Batch was not started")?;
    info!(batch_id = %handle.id(), "batch started");

    let report = follow(handle, json_mode).await?;
    if args.keep_open {
        keep_open(app.driver.as_ref(), report).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["multi-answer", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_queries_from_flags() {
        let args = run_args(&["-q", "Q1", "--query", "Q2", "--prompt", "Merge them"]);
        let request = args.to_request(&Config::default()).await.unwrap();
        assert_eq!(request.queries, vec!["Q1", "Q2"]);
        assert_eq!(request.integration_prompt, "Merge them");
    }

    #[tokio::test]
    async fn test_prompt_defaults_to_config() {
        let args = run_args(&["-q", "Q1", "-q", "Q2"]);
        let config = Config::default();
        let request = args.to_request(&config).await.unwrap();
        assert_eq!(request.integration_prompt, config.default_prompt);
    }

    #[tokio::test]
    async fn test_repeat_needs_one_query() {
        let args = run_args(&["-q", "Same?", "--repeat", "3"]);
        let request = args.to_request(&Config::default()).await.unwrap();
        assert_eq!(request.queries, vec!["Same?"; 3]);

        let args = run_args(&["-q", "A", "-q", "B", "--repeat", "3"]);
        assert!(args.to_request(&Config::default()).await.is_err());
    }

    #[test]
    fn test_repeat_out_of_range_is_rejected_by_parser() {
        for count in ["1", "6", "9223372036854775807"] {
            let result =
                Cli::try_parse_from(["multi-answer", "run", "-q", "Same?", "--repeat", count]);
            assert!(result.is_err(), "--repeat {count} should not parse");
        }
    }

    #[tokio::test]
    async fn test_queries_file_is_normalized() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("queries.txt");
        std::fs::write(&path, "  first  \n\nsecond\n").unwrap();

        let args = run_args(&["--queries-file", path.to_str().unwrap()]);
        let request = args.to_request(&Config::default()).await.unwrap();
        assert_eq!(request.queries, vec!["first", "second"]);
    }

    #[test]
    fn test_queries_file_conflicts_with_queries() {
        let result = Cli::try_parse_from(["multi-answer", "run", "-q", "A", "-f", "q.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_progress_message_counts_terminal_items() {
        let (_tx_a, a) = watch::channel(Item::new(0, "A"));
        let (_tx_b, b) = watch::channel(Item::new(1, "B"));
        assert_eq!(progress_message(&[a, b]), "0/2 answered, 0 failed");
    }
}
