//! Error types for bench-sweep-notify

use std::path::PathBuf;

use thiserror::Error;

/// Why a notification was not delivered
#[derive(Error, Debug)]
pub enum SendError {
    /// Credential file missing, unreadable or empty
    #[error("missing credentials: {0}")]
    MissingCredentials(PathBuf),

    /// Sender or recipients not set
    #[error("notifications not configured: {0}")]
    NotConfigured(String),

    /// Body artifact could not be read
    #[error("failed to read body {path}: {source}")]
    Body {
        /// Body file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Malformed sender or recipient address
    #[error("invalid address {address:?}: {reason}")]
    Address {
        /// The offending address
        address: String,
        /// Parser message
        reason: String,
    },

    /// Message could not be assembled
    #[error("failed to build message: {0}")]
    Message(String),

    /// SMTP connection, authentication or delivery failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl SendError {
    /// Create an address error
    pub fn address(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Address {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}
