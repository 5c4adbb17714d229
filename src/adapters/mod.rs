//! Infrastructure adapters for external systems.

pub mod drivers;
pub mod error_log;
pub mod notify;
