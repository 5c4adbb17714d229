//! `config`: show the merged configuration or validate it.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::{ConfigLoader, PROJECT_CONFIG};

/// Show or validate configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config action
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// `config` actions.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Check the configuration, including the driver setup
    Validate,
}

/// Effective configuration and where it came from.
#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    /// Config file path, or defaults
    pub source: String,
    /// Merged configuration
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        let yaml = serde_yaml::to_string(&self.config).unwrap_or_default();
        format!("# source: {}\n{yaml}", self.source)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Outcome of `config validate`.
#[derive(Debug, Serialize)]
pub struct ConfigValidateOutput {
    /// True when every check passed
    pub valid: bool,
    /// Summary or the first problem found
    pub message: String,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// `config` was loaded (and range-checked) before dispatch; `source` is the
/// explicit file, if one was given.
pub fn execute(args: ConfigArgs, config: &Config, source: Option<&Path>, json_mode: bool) -> Result<()> {
    let source = source.map_or_else(
        || format!("{PROJECT_CONFIG} (and overrides)"),
        |path| path.display().to_string(),
    );

    match args.command {
        ConfigCommands::Show => output(
            &ConfigShowOutput {
                source,
                config: config.clone(),
            },
            json_mode,
        ),
        ConfigCommands::Validate => {
            ConfigLoader::validate(config)?;
            ConfigLoader::validate_driver(config).context("Driver is not usable")?;
            output(
                &ConfigValidateOutput {
                    valid: true,
                    message: format!("Configuration from {source} is valid."),
                },
                json_mode,
            );
        }
    }

    Ok(())
}
