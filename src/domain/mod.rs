//! Domain layer for batch orchestration
//!
//! Models for batches and items, the ports to external collaborators,
//! and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{BatchError, BatchResult, InvalidTransition, ItemError, ValidationError};
