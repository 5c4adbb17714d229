//! Port trait definitions (Hexagonal Architecture)
//!
//! - InteractionDriver: sessions, submission, answer stream
//! - ErrorLog: capped store of terminal failures
//! - Notifier: user-visible failure notices

pub mod error_log;
pub mod interaction_driver;
pub mod notifier;

pub use error_log::ErrorLog;
pub use interaction_driver::{DriverEvent, EventSink, InteractionDriver, Subscription};
pub use notifier::Notifier;
