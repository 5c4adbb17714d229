//! Error log storage.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileErrorLog;
pub use memory::InMemoryErrorLog;
