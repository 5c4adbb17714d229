//! Orchestration services built on the domain ports.

pub mod batch_controller;
pub mod failure_reporter;
pub mod item_worker;
pub mod stability_detector;
pub mod synthesis;

pub use batch_controller::{BatchController, BatchHandle, BatchReport};
pub use failure_reporter::FailureReporter;
pub use item_worker::{ItemOutcome, ItemWorker, SessionDisposition, WorkerSettings};
pub use stability_detector::StabilityDetector;
pub use synthesis::{build_synthesis_prompt, SynthesisDispatcher, SynthesisOutcome, UNAVAILABLE};
