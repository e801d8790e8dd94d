//! WolfLog Error Types

use thiserror::Error;

/// Result type alias for WolfLog operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfLog error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while releasing a handle during teardown or handle replacement
    #[error("Cleanup failed: {0}")]
    Cleanup(std::io::Error),

    /// A primary failure with follow-up failures that happened while cleaning up
    #[error("{primary} ({} suppressed)", .suppressed.len())]
    Suppressed {
        primary: Box<Error>,
        suppressed: Vec<Error>,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Attach `other` as a suppressed error, keeping `self` as the primary.
    pub fn with_suppressed(self, other: Error) -> Error {
        match self {
            Error::Suppressed { primary, mut suppressed } => {
                suppressed.push(other);
                Error::Suppressed { primary, suppressed }
            }
            primary => Error::Suppressed {
                primary: Box::new(primary),
                suppressed: vec![other],
            },
        }
    }

    /// The error that caused the operation to fail
    pub fn primary(&self) -> &Error {
        match self {
            Error::Suppressed { primary, .. } => primary,
            other => other,
        }
    }

    /// Errors that happened after the primary one and were not allowed to replace it
    pub fn suppressed(&self) -> &[Error] {
        match self {
            Error::Suppressed { suppressed, .. } => suppressed,
            _ => &[],
        }
    }
}

/// Collects failures from a sequence of cleanup steps.
///
/// The first failure wins; every later one is attached to it as suppressed.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    first: Option<Error>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        self.first = Some(match self.first.take() {
            Some(primary) => primary.with_suppressed(error),
            None => error,
        });
    }

    /// Record the outcome of one step
    pub fn record<E: Into<Error>>(&mut self, result: std::result::Result<(), E>) {
        if let Err(e) = result {
            self.push(e.into());
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
