//! Common error types for the signaling relay crates.

use thiserror::Error;

/// Common errors that can occur across relay components
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommonError {
    /// An identifier was empty or whitespace-only
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias using `CommonError`
pub type Result<T> = std::result::Result<T, CommonError>;
