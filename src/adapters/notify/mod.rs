//! User notification channels.

pub mod console;
pub mod log;

pub use self::console::ConsoleNotifier;
pub use self::log::TracingNotifier;
