//! Error types for Graphview.
//!
//! This module provides a unified error handling approach using `thiserror`.
//! Variants are grouped by how the render scheduler treats them: transient
//! (`SourceTimeout`), terminal but clean (`SourceExhausted`) and fatal
//! (`SourceDisconnected`, `SourceOpen`).

use thiserror::Error;

/// Result type alias for Graphview operations.
pub type Result<T> = std::result::Result<T, GraphViewError>;

/// Errors that can occur in Graphview.
#[derive(Debug, Error)]
pub enum GraphViewError {
    /// Configuration rejected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No data arrived before the read deadline.
    #[error("Source timed out waiting for data")]
    SourceTimeout,

    /// The source has no more data.
    #[error("Source exhausted")]
    SourceExhausted,

    /// The source lost its connection and cannot produce more data.
    #[error("Source disconnected: {0}")]
    SourceDisconnected(String),

    /// The source could not be opened.
    #[error("Failed to open source {source_name}: {reason}")]
    SourceOpen {
        /// Human readable source description.
        source_name: String,
        /// Why opening failed.
        reason: String,
    },

    /// Downsampling was asked for a zero-width frame.
    #[error("Invalid target width: {0}")]
    InvalidWidth(usize),

    /// Failed to access clipboard.
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] arboard::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal error.
    #[error("Terminal error: {0}")]
    Terminal(String),
}

impl GraphViewError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a SourceDisconnected error.
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::SourceDisconnected(reason.into())
    }

    /// Create a SourceOpen error.
    pub fn source_open(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceOpen {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must stop the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SourceTimeout | Self::SourceExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_of_source_errors() {
        assert!(!GraphViewError::SourceTimeout.is_fatal());
        assert!(!GraphViewError::SourceExhausted.is_fatal());
        assert!(GraphViewError::disconnected("peer closed").is_fatal());
        assert!(GraphViewError::source_open("tcp://x", "refused").is_fatal());
    }

    #[test]
    fn messages_carry_context() {
        let err = GraphViewError::source_open("data.csv", "No such file");
        assert_eq!(err.to_string(), "Failed to open source data.csv: No such file");
        assert_eq!(
            GraphViewError::InvalidWidth(0).to_string(),
            "Invalid target width: 0"
        );
    }
}
