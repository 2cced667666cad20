//! Process-level setup for the binary.

mod logger;

pub use logger::init_logger_with;
