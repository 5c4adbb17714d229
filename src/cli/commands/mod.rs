//! CLI command implementations.

pub mod config;
pub mod logs;
pub mod run;
pub mod submit;
