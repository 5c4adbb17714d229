//! Interaction driver implementations.

pub mod command;
pub mod scripted;

pub use command::CommandDriver;
pub use scripted::{echo_answer, AttemptScript, ScriptStep, ScriptedDriver};
