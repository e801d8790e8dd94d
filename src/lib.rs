//! WolfLog - Multi-Process Safe Rotating Log Files
//!
//! Append-only log files that rotate across a bounded set of numbered
//! segments and can be archived in one step, so finished segments can be
//! uploaded or deleted without losing data that is still being written.
//!
//! # Architecture
//!
//! The log directory is the only source of truth. Every write re-reads the
//! directory listing while holding two locks: a re-entrant mutex shared by
//! all writers for the same path in this process, and an advisory lock on
//! `<name>.lock` shared with other processes.
//!
//! # Features
//!
//! - Size-based segment rotation with a retention count
//! - Archive hand-off to a separate `.bak` namespace
//! - Safe across threads, writer instances and processes
//! - Background dispatcher with levels, tags and error chains

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logfile;

pub use config::WolfLogConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{DispatchConfig, LogConfig, WolfLogConfig};
    pub use crate::dispatch::{Dispatcher, Level, Record};
    pub use crate::error::{Error, Result};
    pub use crate::logfile::{ArchivedFile, LockRegistry, RotatingLogWriter};
}
