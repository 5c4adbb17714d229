//! Common test utilities for integration tests
//!
//! Shared fixtures: a scripted driver, in-memory sinks and a controller
//! wired the way the CLI wires it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use multi_answer::adapters::drivers::ScriptedDriver;
use multi_answer::adapters::error_log::InMemoryErrorLog;
use multi_answer::{BatchController, FailureReporter, Notifier, RetryPolicy, StabilityDetector, WorkerSettings};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Notifier that remembers every `(title, message)` it was given.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        Ok(())
    }
}

/// Settings with the default retry budget (3) and a 3s quiet window.
pub fn settings() -> WorkerSettings {
    WorkerSettings {
        policy: RetryPolicy::new(3),
        retry_delay: Duration::from_secs(1),
        detector: StabilityDetector::new(Duration::from_secs(3), Duration::from_secs(60))
            .with_min_chars(5),
        session_start_timeout: Duration::from_secs(30),
        ping_timeout: Duration::from_secs(2),
        submit_timeout: Duration::from_secs(15),
    }
}

pub struct Harness {
    pub driver: Arc<ScriptedDriver>,
    pub log: Arc<InMemoryErrorLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: BatchController,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: WorkerSettings) -> Self {
        let driver = Arc::new(ScriptedDriver::new());
        let log = Arc::new(InMemoryErrorLog::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let reporter = FailureReporter::new(log.clone(), notifier.clone());
        let controller = BatchController::new(driver.clone(), reporter, settings);
        Self {
            driver,
            log,
            notifier,
            controller,
        }
    }
}
