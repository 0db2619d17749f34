//! JSON-lines document input.
//!
//! One JSON object per line; blank lines are skipped. Errors carry the
//! 1-based line number.

use std::io::BufRead;

use serde_json::Value;

use crate::backend::{BulkBackend, Document};
use crate::batch::BatchWriter;
use crate::error::{DocShellError, Result};

/// A load that stopped before the end of its input
#[derive(Debug)]
pub struct LoadFailure {
    pub error: DocShellError,

    /// Documents read from the input before the failure
    pub read: u64,

    /// Documents the backend confirmed, including batches flushed before the failure
    pub written: u64,
}

impl From<DocShellError> for LoadFailure {
    fn from(error: DocShellError) -> Self {
        Self { error, read: 0, written: 0 }
    }
}

/// Parse one line as a document
pub fn parse_document(line: &str, number: usize) -> Result<Document> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(other) => Err(DocShellError::invalid_document(format!(
            "line {number}: expected a JSON object, found {}",
            kind(&other)
        ))),
        Err(e) => Err(DocShellError::invalid_input(format!("line {number}: {e}"))),
    }
}

/// Lazily read documents from a JSON-lines stream
pub fn read_documents<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Document>> {
    reader.lines().enumerate().filter_map(|(i, line)| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(parse_document(&line, i + 1)),
        Err(e) => Some(Err(DocShellError::invalid_input(format!("line {}: {e}", i + 1)))),
    })
}

/// Push every document of `reader` through `writer`, then close it
///
/// Returns how many documents were read. The writer is closed even when the
/// input fails part way, so every document read before the failure is flushed.
pub fn load<B: BulkBackend>(
    writer: &mut BatchWriter<B>,
    reader: impl BufRead,
) -> std::result::Result<u64, LoadFailure> {
    let mut read = 0u64;
    let pushed = read_documents(reader).try_for_each(|doc| -> Result<()> {
        writer.push(doc?)?;
        read += 1;
        Ok(())
    });
    let closed = writer.close();

    pushed
        .and(closed)
        .map(|()| read)
        .map_err(|error| LoadFailure { error, read, written: writer.written() })
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
