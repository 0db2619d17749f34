//! In-Memory Document Collection
//!
//! A `BulkBackend` that keeps documents in insertion order behind a mutex.
//! It enforces `_id` uniqueness and both write modes exactly like the SQLite
//! backend, and records the size of every batch it receives.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{
    id_key, BulkBackend, BulkWriteFailure, BulkWriteResult, Document, WriteError, WriteMode,
    DUPLICATE_KEY_CODE,
};
use crate::error::{DocShellError, Result};

#[derive(Debug, Default)]
struct CollectionState {
    docs: Vec<Document>,
    ids: HashSet<String>,
    batch_sizes: Vec<usize>,
}

/// In-memory document collection
#[derive(Debug, Default)]
pub struct MemoryCollection {
    name: String,
    state: Mutex<CollectionState>,
}

impl MemoryCollection {
    /// Create an empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: Mutex::default() }
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All stored documents in insertion order
    #[must_use]
    pub fn find_all(&self) -> Vec<Document> {
        self.lock().docs.clone()
    }

    /// Number of stored documents
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().docs.len()
    }

    /// Size of every batch received by `bulk_insert`, in call order
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, CollectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BulkBackend for MemoryCollection {
    fn namespace(&self) -> String {
        format!("memory.{}", self.name)
    }

    fn bulk_insert(&self, docs: Vec<Document>, mode: WriteMode) -> Result<BulkWriteResult> {
        let mut state = self.lock();
        state.batch_sizes.push(docs.len());

        let mut inserted = 0u64;
        let mut write_errors = Vec::new();

        for (index, doc) in docs.into_iter().enumerate() {
            if let Some(key) = id_key(&doc) {
                if state.ids.contains(&key) {
                    write_errors.push(WriteError::new(
                        index,
                        DUPLICATE_KEY_CODE,
                        format!("duplicate key error collection: {} _id: {key}", self.name),
                    ));
                    if mode.is_ordered() {
                        break;
                    }
                    continue;
                }
                state.ids.insert(key);
            }
            state.docs.push(doc);
            inserted += 1;
        }

        if write_errors.is_empty() {
            Ok(BulkWriteResult::new(inserted))
        } else {
            Err(DocShellError::BulkWrite(BulkWriteFailure { inserted, write_errors }))
        }
    }
}
