//! Utilities

pub mod logger;

pub use logger::{LoggerGuard, cleanup_old_logs, init_logger, init_logger_with_file};
