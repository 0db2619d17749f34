//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout docshell.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `Pagination`: The terminal cannot hold a page plus its prompt
//! - `InvalidInput`: Misuse of an API (zero write limit, push after close, ...)
//! - `InvalidDocument`: A document the backend cannot store (caller bug)
//! - `BulkWrite`: Partial or total failure of a bulk insert (server-side conflict)
//! - `ConnectionFailed`: Backend could not be opened
//! - `BackendError`: Backend-specific failure outside a bulk insert
//! - `ConfigError`: Configuration file errors
//! - `Output`: Terminal or mirror file I/O failure
//!
//! Quitting at the pagination prompt and Ctrl-C are not errors; they are reported
//! through [`crate::pager::RenderOutcome`].

use thiserror::Error;

use crate::backend::BulkWriteFailure;

/// Main error type for docshell operations
#[derive(Error, Debug)]
pub enum DocShellError {
    /// Terminal dimensions leave no room for output and prompt
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// Invalid input or API misuse
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Document cannot be encoded for the backend
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Bulk insert failed for some or all documents of a batch
    #[error("Bulk write failed: {0}")]
    BulkWrite(BulkWriteFailure),

    /// Backend connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Backend-specific error
    #[error("Backend error ({backend}): {detail}")]
    BackendError { backend: String, detail: String },

    /// Configuration error (file not found, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Writing to the terminal or the mirror file failed
    #[error("Output error: {0}")]
    Output(String),
}

impl DocShellError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Pagination(_) => "PAGINATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidDocument(_) => "INVALID_DOCUMENT",
            Self::BulkWrite(_) => "BULK_WRITE_ERROR",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::BackendError { .. } => "BACKEND_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Output(_) => "OUTPUT_ERROR",
        }
    }

    /// Get human-readable error message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Number of documents the backend confirmed before a bulk failure, if any
    #[must_use]
    pub const fn inserted_before_failure(&self) -> Option<u64> {
        match self {
            Self::BulkWrite(failure) => Some(failure.inserted),
            _ => None,
        }
    }

    /// Create a pagination error
    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid document error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a backend-specific error
    pub fn backend_error(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::BackendError { backend: backend.into(), detail: detail.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output(message.into())
    }
}

/// Result type alias for docshell operations
pub type Result<T> = std::result::Result<T, DocShellError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WriteError;

    #[test]
    fn test_error_codes() {
        assert_eq!(DocShellError::pagination("test").error_code(), "PAGINATION_ERROR");
        assert_eq!(DocShellError::invalid_input("test").error_code(), "INVALID_INPUT");
        assert_eq!(DocShellError::invalid_document("test").error_code(), "INVALID_DOCUMENT");
        assert_eq!(DocShellError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(DocShellError::backend_error("sqlite", "test").error_code(), "BACKEND_ERROR");
        assert_eq!(DocShellError::config_error("test").error_code(), "CONFIG_ERROR");
        assert_eq!(DocShellError::output("test").error_code(), "OUTPUT_ERROR");
        let failure = BulkWriteFailure { inserted: 0, write_errors: Vec::new() };
        assert_eq!(DocShellError::BulkWrite(failure).error_code(), "BULK_WRITE_ERROR");
    }

    #[test]
    fn test_error_messages() {
        let err = DocShellError::pagination("terminal has 1 row");
        assert!(err.message().contains("terminal has 1 row"));

        let err = DocShellError::backend_error("sqlite", "disk I/O error");
        assert!(err.message().contains("sqlite"));
        assert!(err.message().contains("disk I/O error"));
    }

    #[test]
    fn test_bulk_write_failure_reports_inserted_count() {
        let failure = BulkWriteFailure {
            inserted: 7,
            write_errors: vec![WriteError::new(3, 11000, "duplicate key")],
        };
        let err = DocShellError::BulkWrite(failure);
        assert_eq!(err.inserted_before_failure(), Some(7));
        assert!(err.message().contains("7 inserted"));
        assert!(err.message().contains("duplicate key"));

        assert_eq!(DocShellError::invalid_document("bad").inserted_before_failure(), None);
    }
}
