//! Log records and their text form

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Record severity, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Verbose,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Single-letter form used in formatted lines
    pub fn letter(&self) -> char {
        match self {
            Level::Verbose => 'V',
            Level::Debug => 'D',
            Level::Info => 'I',
            Level::Warn => 'W',
            Level::Error => 'E',
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Verbose => "verbose",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for Level {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v" | "verbose" | "trace" => Ok(Level::Verbose),
            "d" | "debug" => Ok(Level::Debug),
            "i" | "info" => Ok(Level::Info),
            "w" | "warn" | "warning" => Ok(Level::Warn),
            "e" | "error" => Ok(Level::Error),
            other => Err(crate::Error::Config(format!("unknown level: {}", other))),
        }
    }
}

/// One message on its way to the log file
#[derive(Debug, Clone)]
pub struct Record {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub tag: String,
    pub message: String,
    /// Attached error, outermost first
    pub causes: Vec<String>,
    pub pid: u32,
    pub thread: String,
}

impl Record {
    pub fn new(level: Level, tag: impl Into<String>, message: impl Into<String>) -> Self {
        let current = std::thread::current();
        let thread = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };

        Self {
            timestamp: Local::now(),
            level,
            tag: tag.into(),
            message: message.into(),
            causes: Vec::new(),
            pid: std::process::id(),
            thread,
        }
    }

    /// Attach an error and its whole `source()` chain
    pub fn with_error(mut self, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut next = Some(error);
        while let Some(e) = next {
            self.causes.push(e.to_string());
            next = e.source();
        }
        self
    }

    /// Render the record; every line carries the full prefix and ends in `\n`
    pub fn format(&self) -> String {
        let prefix = format!(
            "{} {}-{} {}/{}: ",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.pid,
            self.thread,
            self.level.letter(),
            self.tag
        );

        let mut out = String::with_capacity(prefix.len() + self.message.len() + 1);
        let mut lines = self.message.lines().peekable();
        if lines.peek().is_none() {
            out.push_str(&prefix);
            out.push('\n');
        }
        for line in lines {
            out.push_str(&prefix);
            out.push_str(line);
            out.push('\n');
        }

        for (depth, cause) in self.causes.iter().enumerate() {
            out.push_str(&prefix);
            if depth == 0 {
                out.push('\t');
            } else {
                out.push_str("\tcaused by: ");
            }
            out.push_str(cause);
            out.push('\n');
        }
        out
    }
}
