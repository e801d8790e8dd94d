//! WolfLog Configuration
//!
//! This module provides configuration structures for rotating log files,
//! the record dispatcher, and wolflog's own diagnostics.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dispatch::Level;

/// Main WolfLog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfLogConfig {
    /// Rotating log file configuration
    pub log: LogConfig,

    /// Record dispatcher configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rotating log file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory holding the segment, archive and lock files
    pub directory: PathBuf,

    /// Base name shared by every file of this log
    pub name: String,

    /// Maximum segment size in bytes (0 = unbounded)
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Maximum number of segments kept per namespace
    #[serde(default = "default_max_count")]
    pub max_count: usize,

    /// Sync segment data to disk after every append
    #[serde(default)]
    pub fsync: bool,
}

/// Record dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Tag used when the caller does not pass one
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Minimum level written to the log
    #[serde(default)]
    pub level: Level,

    /// Echo records through tracing
    #[serde(default)]
    pub console: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_max_size() -> u64 {
    1024 * 1024
}

fn default_max_count() -> usize {
    8
}

fn default_tag() -> String {
    "wolflog".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tag: default_tag(),
            level: Level::default(),
            console: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LogConfig {
    /// Build a log configuration with default sizing
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
            max_size: default_max_size(),
            max_count: default_max_count(),
            fsync: false,
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_count == 0 {
            return Err(crate::Error::Config("max_count must be positive".into()));
        }

        if self.name.is_empty() {
            return Err(crate::Error::Config("log.name cannot be empty".into()));
        }

        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(crate::Error::Config(format!(
                "log.name must be a plain file name: {}",
                self.name
            )));
        }

        if self.directory.as_os_str().is_empty() {
            return Err(crate::Error::Config("log.directory cannot be empty".into()));
        }

        Ok(())
    }

    /// Whether segments grow without a size limit
    pub fn unbounded(&self) -> bool {
        self.max_size == 0
    }
}

impl WolfLogConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfLogConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.log.validate()?;

        if self.dispatch.tag.is_empty() {
            return Err(crate::Error::Config("dispatch.tag cannot be empty".into()));
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => Ok(()),
            other => Err(crate::Error::Config(format!(
                "logging.format must be pretty or compact, got {}",
                other
            ))),
        }
    }

    /// Path of the cross-process lock file
    pub fn lock_path(&self) -> PathBuf {
        self.log.directory.join(format!("{}.lock", self.log.name))
    }
}
