//! Multi-Answer - concurrent question batches with answer synthesis
//!
//! A batch of 2 to 5 queries is fanned out to isolated conversational
//! sessions, one worker per query. Each worker waits for its answer to stop
//! changing, retries failed attempts within a bounded budget, and records
//! terminal failures. Once every item is terminal, the answers are combined
//! with an integration prompt and submitted to one more session.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports and the error taxonomy
//! - **Service Layer** (`services`): stability detection, workers, batch control, synthesis
//! - **Adapters** (`adapters`): interaction drivers, error log stores, notifiers
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use multi_answer::adapters::drivers::ScriptedDriver;
//! use multi_answer::adapters::error_log::InMemoryErrorLog;
//! use multi_answer::adapters::notify::TracingNotifier;
//! use multi_answer::{BatchController, BatchRequest, FailureReporter, WorkerSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reporter = FailureReporter::new(
//!         Arc::new(InMemoryErrorLog::default()),
//!         Arc::new(TracingNotifier),
//!     );
//!     let controller = BatchController::new(
//!         Arc::new(ScriptedDriver::new()),
//!         reporter,
//!         WorkerSettings::default(),
//!     );
//!
//!     let request = BatchRequest::new(["What is Rust?", "What is Go?"], "Compare the answers.");
//!     let mut handle = controller.start_batch(request)?;
//!     let report = handle.wait().await?;
//!     println!("{}", report.synthesis.answer);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{BatchError, BatchResult, ItemError, ValidationError};
pub use domain::models::{
    Batch, BatchId, BatchRequest, BatchState, Config, ControlMessage, ControlResponse,
    ErrorLogEntry, Item, ItemState, RetryPolicy,
};
pub use domain::ports::{ErrorLog, InteractionDriver, Notifier};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    BatchController, BatchHandle, BatchReport, FailureReporter, StabilityDetector,
    WorkerSettings,
};
