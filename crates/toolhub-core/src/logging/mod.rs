//! Logging abstractions for runtime-agnostic logging
//!
//! Every component receives an `Arc<dyn Logger>` at construction time;
//! nothing in this crate logs through a global.

mod traits;
mod noop;
mod console;
mod file_logger;
mod recording;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use file_logger::{FileLogger, LogLevel};
pub use recording::{LogRecord, RecordingLogger};
