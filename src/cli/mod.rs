//! Command-line interface.

pub mod app;
pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use commands::{config::ConfigArgs, logs::LogsArgs, run::RunArgs, submit::SubmitArgs};

/// Fan a set of queries out to concurrent sessions and synthesize the answers.
#[derive(Parser, Debug)]
#[command(name = "multi-answer", version, about)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file to use instead of .multi-answer/config.yaml
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a batch of queries and synthesize the answers
    Run(RunArgs),
    /// Start a batch from a START_BATCH control message
    Submit(SubmitArgs),
    /// Inspect or clear the error log
    Logs(LogsArgs),
    /// Show or validate configuration
    Config(ConfigArgs),
}

/// Print `err` and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "status": "error",
            "message": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("error:").for_stderr().red().bold());
    }
    std::process::exit(1)
}
