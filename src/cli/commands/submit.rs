//! `submit`: start a batch from a JSON control message.
//!
//! The message is the same `START_BATCH` object an embedding host would
//! send; the acknowledgement is printed as a JSON line before the batch runs.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use super::run::{follow, read_input};
use crate::cli::app::App;
use crate::domain::models::{Config, ControlMessage, ControlResponse};

/// Start a batch from a START_BATCH control message
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// File holding the control message ("-" for stdin)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    pub message: PathBuf,

    /// Use the scripted driver instead of the configured helper
    #[arg(long)]
    pub dry_run: bool,
}

/// Decode a JSON control message.
pub fn parse_message(raw: &str) -> Result<ControlMessage> {
    serde_json::from_str(raw).context("Failed to parse control message")
}

/// Run the batch a control message asks for.
pub async fn execute(args: SubmitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let message = parse_message(&read_input(&args.message).await?)?;
    let app = App::build(config, args.dry_run, json_mode)?;

    let (response, handle) = app.controller.handle_message(message);
    println!("{}", serde_json::to_string(&response)?);

    match (response, handle) {
        (ControlResponse::Ok { .. }, Some(handle)) => {
            follow(handle, json_mode).await?;
            Ok(())
        }
        (ControlResponse::Error { message }, _) => bail!(message),
        (ControlResponse::Ok { batch_id }, None) => bail!("Batch {batch_id} was accepted without a handle"),
    }
}
