//! Domain models.

pub mod batch;
pub mod config;
pub mod control;
pub mod error_log;
pub mod item;
pub mod query;
pub mod retry;
pub mod session;

pub use batch::{Batch, BatchId, BatchRequest, BatchState};
pub use config::{
    Config, DriverConfig, DriverKind, ErrorLogConfig, LogFormat, LoggingConfig, RetryConfig,
    RotationPolicy, StabilityConfig,
};
pub use control::{ControlMessage, ControlResponse};
pub use error_log::{ErrorLogBuffer, ErrorLogEntry, ERROR_LOG_CAPACITY};
pub use item::{Item, ItemState};
pub use retry::RetryPolicy;
pub use session::{SessionHandle, SessionId};
