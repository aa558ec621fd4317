//! Error types for bench-sweep-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The benchmark executable could not be probed for its options
    #[error("capability probe of `{program}` failed: {reason}")]
    Probe {
        /// Rendered command line that was probed
        program: String,
        /// What went wrong
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (scenario files, label tables)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a probe error
    pub fn probe(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Probe {
            program: program.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
