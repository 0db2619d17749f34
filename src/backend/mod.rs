//! Document Backend Traits and Core Types
//!
//! This module defines the bulk-write capability the batch writer depends on.
//! A backend is a named document collection that can insert an ordered batch of
//! documents in one call and report how many it actually stored.
//!
//! # Write Modes
//! - `Ordered`: stop at the first per-document error; documents before it stay inserted
//! - `Unordered`: attempt every document and report all per-document errors together
//!
//! # Failure Reporting
//! A batch with any per-document error is reported as
//! [`DocShellError::BulkWrite`] carrying a [`BulkWriteFailure`], whose `inserted`
//! field is the number of documents the backend confirmed. Callers count confirmed
//! documents from that field, never from the batch length.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DocShellError, Result};

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// A document: a JSON object
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Error code reported for a duplicate `_id`
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Error code reported for a document the backend could not encode
pub const INVALID_DOCUMENT_CODE: i32 = 2;

/// Bulk write ordering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Abort the batch at the first per-document error
    Ordered,
    /// Continue past per-document errors and report them together
    #[default]
    Unordered,
}

impl WriteMode {
    /// Get the mode name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ordered => "ordered",
            Self::Unordered => "unordered",
        }
    }

    /// Mode from an `ordered` flag
    #[must_use]
    pub const fn from_ordered(ordered: bool) -> Self {
        if ordered {
            Self::Ordered
        } else {
            Self::Unordered
        }
    }

    /// Whether the batch stops at the first error
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        matches!(self, Self::Ordered)
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a fully successful bulk insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BulkWriteResult {
    /// Number of documents the backend stored
    pub inserted: u64,
}

impl BulkWriteResult {
    #[must_use]
    pub const fn new(inserted: u64) -> Self {
        Self { inserted }
    }
}

/// A single document's failure inside a bulk insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteError {
    /// Position of the document within the batch
    pub index: usize,

    /// Backend error code (e.g. [`DUPLICATE_KEY_CODE`])
    pub code: i32,

    /// Backend error message
    pub message: String,
}

impl WriteError {
    pub fn new(index: usize, code: i32, message: impl Into<String>) -> Self {
        Self { index, code, message: message.into() }
    }
}

/// Partial or total failure of a bulk insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteFailure {
    /// Documents the backend confirmed before or despite the errors
    pub inserted: u64,

    /// Per-document errors, in batch order
    pub write_errors: Vec<WriteError>,
}

impl fmt::Display for BulkWriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} inserted, {} write error(s)", self.inserted, self.write_errors.len())?;
        for err in self.write_errors.iter().take(3) {
            write!(f, "; [{}] code {}: {}", err.index, err.code, err.message)?;
        }
        if self.write_errors.len() > 3 {
            write!(f, "; ...")?;
        }
        Ok(())
    }
}

/// Bulk-write capability of a document collection
///
/// Implementations are synchronous: `bulk_insert` returns once the backend has
/// processed the whole batch (or stopped, in ordered mode).
pub trait BulkBackend {
    /// Human-readable collection name used in log and error context
    fn namespace(&self) -> String;

    /// Check that a document can be encoded by this backend
    ///
    /// Called for every document before it joins a batch.
    fn check_document(&self, doc: &Document) -> Result<()> {
        validate_document(doc)
    }

    /// Insert a batch of documents
    ///
    /// Returns `Err(DocShellError::BulkWrite(..))` if any document failed; the
    /// failure's `inserted` count is authoritative.
    fn bulk_insert(&self, docs: Vec<Document>, mode: WriteMode) -> Result<BulkWriteResult>;
}

impl<T: BulkBackend + ?Sized> BulkBackend for &T {
    fn namespace(&self) -> String {
        (**self).namespace()
    }

    fn check_document(&self, doc: &Document) -> Result<()> {
        (**self).check_document(doc)
    }

    fn bulk_insert(&self, docs: Vec<Document>, mode: WriteMode) -> Result<BulkWriteResult> {
        (**self).bulk_insert(docs, mode)
    }
}

/// Validate document field names
///
/// Field names must be non-empty, must not start with `$` and must not contain
/// NUL. Nested objects (including objects inside arrays) are checked too.
pub fn validate_document(doc: &Document) -> Result<()> {
    validate_fields(doc, "")
}

fn validate_fields(doc: &Document, path: &str) -> Result<()> {
    for (key, value) in doc {
        let field = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
        if key.is_empty() {
            return Err(DocShellError::invalid_document(format!(
                "empty field name at '{}'",
                if path.is_empty() { "<root>" } else { path }
            )));
        }
        if key.starts_with('$') {
            return Err(DocShellError::invalid_document(format!(
                "field name '{field}' must not start with '$'"
            )));
        }
        if key.contains('\0') {
            return Err(DocShellError::invalid_document(format!(
                "field name '{}' contains a NUL character",
                field.replace('\0', "\\0")
            )));
        }
        validate_value(value, &field)?;
    }
    Ok(())
}

fn validate_value(value: &serde_json::Value, path: &str) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => validate_fields(map, path),
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(item, &format!("{path}.{i}"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Key used for `_id` uniqueness checks, if the document has an `_id`
pub(crate) fn id_key(doc: &Document) -> Option<String> {
    doc.get("_id").map(serde_json::Value::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_write_mode_serialization() {
        assert_eq!(serde_json::to_string(&WriteMode::Ordered).unwrap(), r#""ordered""#);
        assert_eq!(serde_json::to_string(&WriteMode::Unordered).unwrap(), r#""unordered""#);
        assert_eq!(WriteMode::default(), WriteMode::Unordered);
        assert!(WriteMode::from_ordered(true).is_ordered());
        assert!(!WriteMode::from_ordered(false).is_ordered());
    }

    #[test]
    fn test_validate_accepts_plain_documents() {
        assert!(validate_document(&doc(json!({"v": 1, "name": "x"}))).is_ok());
        assert!(validate_document(&doc(json!({"a": {"b": [{"c": 1}]}}))).is_ok());
        assert!(validate_document(&Document::new()).is_ok());
    }

    #[test]
    fn test_validate_rejects_dollar_fields() {
        let err = validate_document(&doc(json!({"$set": 1}))).unwrap_err();
        assert!(matches!(err, DocShellError::InvalidDocument(_)));

        let err = validate_document(&doc(json!({"a": [{"$bad": 1}]}))).unwrap_err();
        assert!(err.message().contains("a.0.$bad"));
    }

    #[test]
    fn test_validate_rejects_empty_and_nul_fields() {
        assert!(validate_document(&doc(json!({"": 1}))).is_err());
        assert!(validate_document(&doc(json!({"a\u{0}b": 1}))).is_err());
    }

    #[test]
    fn test_failure_display_truncates_errors() {
        let failure = BulkWriteFailure {
            inserted: 1,
            write_errors: (0..5).map(|i| WriteError::new(i, DUPLICATE_KEY_CODE, "dup")).collect(),
        };
        let text = failure.to_string();
        assert!(text.starts_with("1 inserted, 5 write error(s)"));
        assert!(text.ends_with("; ..."));
    }

    #[test]
    fn test_id_key() {
        assert_eq!(id_key(&doc(json!({"_id": 1}))), Some("1".to_string()));
        assert_eq!(id_key(&doc(json!({"_id": "a"}))), Some("\"a\"".to_string()));
        assert_eq!(id_key(&doc(json!({"v": 1}))), None);
    }
}
