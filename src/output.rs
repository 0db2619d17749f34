//! JSON Output Envelope Types
//!
//! Commands that report a result rather than page text (`load`, and every
//! failure) print exactly one envelope to stdout.
//!
//! # Output Contract
//! - Success: `{"ok": true, "backend": "...", "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "backend": "...", "command": "...", "error": {"code": "...", "message": "..."}}`

use serde::{Deserialize, Serialize};

use crate::backend::WriteMode;
use crate::error::DocShellError;

/// Success envelope for command results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Backend used for this command (memory, sqlite, or empty)
    pub backend: String,

    /// Command that was executed (load, scan, page, show)
    pub command: String,

    /// Command-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(
        backend: impl Into<String>,
        command: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self { ok: true, backend: backend.into(), command: command.into(), data, meta }
    }
}

/// Error envelope for command failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Backend (empty string if the failure is not backend-specific)
    pub backend: String,

    pub command: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(backend: impl Into<String>, command: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, backend: backend.into(), command: command.into(), error }
    }

    /// Create error envelope from a [`DocShellError`]
    pub fn from_error(
        backend: impl Into<String>,
        command: impl Into<String>,
        err: &DocShellError,
    ) -> Self {
        let mut info = ErrorInfo::new(err.error_code(), err.message());
        info.inserted = err.inserted_before_failure();
        Self::new(backend, command, info)
    }

    /// Record how many documents were stored before the command failed
    #[must_use]
    pub fn with_written(mut self, written: u64) -> Self {
        self.error.written = Some(written);
        self
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "BULK_WRITE_ERROR", "PAGINATION_ERROR")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Documents the backend inserted from the failed batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted: Option<u64>,

    /// Documents stored by the whole command before it failed (`load` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written: Option<u64>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), inserted: None, written: None }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of documents processed (None for commands without documents)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<u64>,
}

impl Metadata {
    pub fn new(execution_ms: u64) -> Self {
        Self { execution_ms, documents: None }
    }

    pub fn with_documents(execution_ms: u64, documents: u64) -> Self {
        Self { execution_ms, documents: Some(documents) }
    }
}

/// Result of a `load` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Target collection, as `<backend>.<collection>`
    pub namespace: String,

    /// Documents read from the input
    pub read: u64,

    /// Documents confirmed by the backend
    pub written: u64,

    /// Bulk inserts executed
    pub batches: u64,

    pub write_limit: usize,

    pub mode: WriteMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BulkWriteFailure, WriteError};
    use serde_json;

    #[test]
    fn test_success_envelope_serialization() {
        let envelope = SuccessEnvelope::new(
            "sqlite",
            "load",
            serde_json::json!({"written": 3}),
            Metadata::with_documents(42, 3),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""ok":true"#));
        assert!(json.contains(r#""backend":"sqlite""#));
        assert!(json.contains(r#""command":"load""#));
        assert!(json.contains(r#""execution_ms":42"#));
        assert!(json.contains(r#""documents":3"#));
    }

    #[test]
    fn test_error_envelope_serialization() {
        let envelope = ErrorEnvelope::new(
            "sqlite",
            "scan",
            ErrorInfo::new("CONNECTION_FAILED", "Could not open database"),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""ok":false"#));
        assert!(json.contains(r#""code":"CONNECTION_FAILED""#));
        assert!(!json.contains("inserted"));
    }

    #[test]
    fn test_error_envelope_carries_partial_count() {
        let err = DocShellError::BulkWrite(BulkWriteFailure {
            inserted: 7,
            write_errors: vec![WriteError::new(7, 11000, "duplicate key")],
        });
        let envelope = ErrorEnvelope::from_error("memory", "load", &err);

        assert!(!envelope.ok);
        assert_eq!(envelope.error.code, "BULK_WRITE_ERROR");
        assert_eq!(envelope.error.inserted, Some(7));

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error"]["inserted"], 7);
    }

    #[test]
    fn test_error_envelope_with_written() {
        let err = DocShellError::invalid_input("line 4: key must be a string");
        let envelope = ErrorEnvelope::from_error("memory", "load", &err).with_written(3);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error"]["written"], 3);
        assert!(json["error"].get("inserted").is_none());
    }

    #[test]
    fn test_metadata_without_documents() {
        let json = serde_json::to_string(&Metadata::new(100)).unwrap();
        assert!(json.contains(r#""execution_ms":100"#));
        assert!(!json.contains("documents"));
    }

    #[test]
    fn test_load_report_mode_is_lowercase() {
        let report = LoadReport {
            namespace: "memory.people".to_string(),
            read: 10,
            written: 10,
            batches: 2,
            write_limit: 5,
            mode: WriteMode::Ordered,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "ordered");
        assert_eq!(json["batches"], 2);
    }
}
