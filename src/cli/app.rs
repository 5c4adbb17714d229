//! Wiring of config, driver, sinks and controller for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::drivers::{CommandDriver, ScriptedDriver};
use crate::adapters::error_log::JsonFileErrorLog;
use crate::adapters::notify::{ConsoleNotifier, TracingNotifier};
use crate::domain::models::{Config, DriverKind};
use crate::domain::ports::{ErrorLog, InteractionDriver, Notifier};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{BatchController, FailureReporter, WorkerSettings};

/// Load configuration from `path`, or from the default layers when absent.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Build the interaction driver. `dry_run` forces the scripted driver.
pub fn build_driver(config: &Config, dry_run: bool) -> Result<Arc<dyn InteractionDriver>> {
    if dry_run || config.driver.kind == DriverKind::Scripted {
        return Ok(Arc::new(ScriptedDriver::new()));
    }

    ConfigLoader::validate_driver(config)?;
    let driver = CommandDriver::from_config(&config.driver).context("Failed to set up the helper driver")?;
    Ok(Arc::new(driver))
}

/// Error log from the `error_log` config section.
pub fn build_error_log(config: &Config) -> Arc<dyn ErrorLog> {
    Arc::new(JsonFileErrorLog::from_config(&config.error_log))
}

/// Console notifications in human mode; JSON mode keeps stdout clean and
/// routes them through tracing instead.
pub fn build_notifier(json_mode: bool) -> Arc<dyn Notifier> {
    if json_mode {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(ConsoleNotifier::stderr())
    }
}

/// Everything a batch-running command needs.
pub struct App {
    /// Controller wired to the driver and the error log
    pub controller: BatchController,
    /// Shared with the controller's failure reporter
    pub error_log: Arc<dyn ErrorLog>,
    /// Kept for closing the synthesis session
    pub driver: Arc<dyn InteractionDriver>,
}

impl App {
    /// Wire the driver, error log and notifier for one command run.
    pub fn build(config: &Config, dry_run: bool, json_mode: bool) -> Result<Self> {
        let driver = build_driver(config, dry_run)?;
        let error_log = build_error_log(config);
        let reporter = FailureReporter::new(error_log.clone(), build_notifier(json_mode));
        let controller = BatchController::new(driver.clone(), reporter, WorkerSettings::from_config(config));

        tracing::debug!(driver = driver.name(), dry_run, "application wired");

        Ok(Self {
            controller,
            error_log,
            driver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_uses_scripted_driver() {
        let config = Config::default();
        let driver = build_driver(&config, true).unwrap();
        assert_eq!(driver.name(), "scripted");
    }

    #[test]
    fn test_command_driver_without_command_is_an_error() {
        let err = build_driver(&Config::default(), false).err().unwrap();
        assert!(err.to_string().contains("driver.command"));
    }
}
