//! `SQLite` Document Collection
//!
//! This module implements the `BulkBackend` trait on top of a `SQLite` database.
//!
//! # Storage Layout
//! Each collection is one table:
//! - `seq`: insertion order (`INTEGER PRIMARY KEY AUTOINCREMENT`)
//! - `doc_id`: JSON encoding of the document's `_id`, `UNIQUE` (NULL when absent)
//! - `body`: the document as compact JSON text
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - One transaction per batch; a `UNIQUE` violation only fails its own statement
//! - Ordered batches stop at the first violation and commit what came before it

use rusqlite::{params, Connection, ErrorCode, OpenFlags};
use std::path::Path;
use std::time::Duration;

use crate::backend::{
    id_key, BulkBackend, BulkWriteFailure, BulkWriteResult, Document, WriteError, WriteMode,
    DUPLICATE_KEY_CODE,
};
use crate::error::{DocShellError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite`-backed document collection
pub struct SqliteCollection {
    conn: Connection,
    name: String,
    table: String,
}

impl SqliteCollection {
    /// Open (or create) collection `name` in the database file at `path`
    pub fn open(path: impl AsRef<Path>, name: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path.as_ref(), flags).map_err(|e| {
            DocShellError::connection_failed(format!("Failed to open SQLite database: {e}"))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| {
            DocShellError::backend_error("sqlite", format!("Failed to set timeout: {e}"))
        })?;
        Self::with_connection(conn, name)
    }

    /// Collection in a private in-memory database
    pub fn in_memory(name: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DocShellError::connection_failed(format!("Failed to open in-memory database: {e}"))
        })?;
        Self::with_connection(conn, name)
    }

    fn with_connection(conn: Connection, name: &str) -> Result<Self> {
        validate_collection_name(name)?;
        let table = quote_ident(name);

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT UNIQUE,
                body TEXT NOT NULL
            )"
        ))
        .map_err(|e| {
            DocShellError::backend_error("sqlite", format!("Failed to create collection {name}: {e}"))
        })?;

        Ok(Self { conn, name: name.to_string(), table })
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All stored documents in insertion order
    pub fn find_all(&self) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT body FROM {} ORDER BY seq", self.table))
            .map_err(|e| DocShellError::backend_error("sqlite", format!("Failed to scan: {e}")))?;

        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DocShellError::backend_error("sqlite", format!("Failed to scan: {e}")))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| {
                DocShellError::backend_error("sqlite", format!("Failed to read document: {e}"))
            })?;

        bodies
            .iter()
            .map(|body| {
                serde_json::from_str::<Document>(body).map_err(|e| {
                    DocShellError::backend_error("sqlite", format!("Corrupt stored document: {e}"))
                })
            })
            .collect()
    }

    /// Number of stored documents
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
            .map_err(|e| DocShellError::backend_error("sqlite", format!("Failed to count: {e}")))
    }
}

impl BulkBackend for SqliteCollection {
    fn namespace(&self) -> String {
        format!("sqlite.{}", self.name)
    }

    fn bulk_insert(&self, docs: Vec<Document>, mode: WriteMode) -> Result<BulkWriteResult> {
        let tx = self.conn.unchecked_transaction().map_err(|e| {
            DocShellError::backend_error("sqlite", format!("Failed to begin batch: {e}"))
        })?;

        let mut inserted = 0u64;
        let mut write_errors = Vec::new();
        {
            let mut stmt = tx
                .prepare(&format!("INSERT INTO {} (doc_id, body) VALUES (?1, ?2)", self.table))
                .map_err(|e| {
                    DocShellError::backend_error("sqlite", format!("Failed to prepare insert: {e}"))
                })?;

            for (index, doc) in docs.iter().enumerate() {
                let body = serde_json::to_string(doc).map_err(|e| {
                    DocShellError::invalid_document(format!("document {index} cannot be encoded: {e}"))
                })?;

                match stmt.execute(params![id_key(doc), body]) {
                    Ok(_) => inserted += 1,
                    Err(rusqlite::Error::SqliteFailure(err, msg))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        let detail = msg.unwrap_or_else(|| err.to_string());
                        write_errors.push(WriteError::new(
                            index,
                            DUPLICATE_KEY_CODE,
                            format!("duplicate key error collection: {}: {detail}", self.name),
                        ));
                        if mode.is_ordered() {
                            break;
                        }
                    }
                    Err(e) => {
                        return Err(DocShellError::backend_error(
                            "sqlite",
                            format!("Insert of document {index} failed: {e}"),
                        ));
                    }
                }
            }
        }

        tx.commit().map_err(|e| {
            DocShellError::backend_error("sqlite", format!("Failed to commit batch: {e}"))
        })?;

        if write_errors.is_empty() {
            Ok(BulkWriteResult::new(inserted))
        } else {
            Err(DocShellError::BulkWrite(BulkWriteFailure { inserted, write_errors }))
        }
    }
}

/// Collection names must be non-empty, free of `$` and NUL, and not reserved by `SQLite`
fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DocShellError::invalid_input("Collection name cannot be empty"));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(DocShellError::invalid_input(format!(
            "Collection name '{}' must not contain '$' or NUL",
            name.replace('\0', "\\0")
        )));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(DocShellError::invalid_input(format!(
            "Collection name '{name}' is reserved"
        )));
    }
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_roundtrip_in_insertion_order() {
        let coll = SqliteCollection::in_memory("people").unwrap();
        let docs = vec![doc(json!({"name": "b"})), doc(json!({"name": "a"}))];
        assert_eq!(coll.bulk_insert(docs, WriteMode::Ordered).unwrap().inserted, 2);

        let found = coll.find_all().unwrap();
        assert_eq!(found, vec![doc(json!({"name": "b"})), doc(json!({"name": "a"}))]);
        assert_eq!(coll.count().unwrap(), 2);
    }

    #[test]
    fn test_ordered_batch_commits_prefix() {
        let coll = SqliteCollection::in_memory("c").unwrap();
        let docs = vec![
            doc(json!({"_id": 1})),
            doc(json!({"_id": 1})),
            doc(json!({"_id": 2})),
        ];
        let err = coll.bulk_insert(docs, WriteMode::Ordered).unwrap_err();
        assert_eq!(err.inserted_before_failure(), Some(1));
        assert_eq!(coll.count().unwrap(), 1);
    }

    #[test]
    fn test_unordered_batch_skips_conflicts() {
        let coll = SqliteCollection::in_memory("c").unwrap();
        let docs = vec![
            doc(json!({"_id": 1})),
            doc(json!({"_id": 1})),
            doc(json!({"_id": 2})),
        ];
        let err = coll.bulk_insert(docs, WriteMode::Unordered).unwrap_err();
        match err {
            DocShellError::BulkWrite(failure) => {
                assert_eq!(failure.inserted, 2);
                assert_eq!(failure.write_errors[0].index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(coll.count().unwrap(), 2);
    }

    #[test]
    fn test_collection_name_validation() {
        assert!(SqliteCollection::in_memory("").is_err());
        assert!(SqliteCollection::in_memory("a$b").is_err());
        assert!(SqliteCollection::in_memory("sqlite_master").is_err());
        assert!(SqliteCollection::in_memory("with \"quotes\"").is_ok());
    }
}
