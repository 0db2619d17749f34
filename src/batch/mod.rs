//! Batched Bulk Writer
//!
//! [`BatchWriter`] accepts documents one at a time, accumulates them into a
//! pending batch and hands every full batch of `write_limit` documents to a
//! [`BulkBackend`] in a single synchronous call. Closing the writer flushes the
//! partially filled batch; so does dropping it without closing.
//!
//! # States
//! - `Idle`: no documents pending
//! - `Accumulating`: `0 < pending < write_limit`
//! - `Flushing`: a batch is being executed by the backend
//! - `Closed`: terminal; further pushes are rejected, further closes are no-ops
//!
//! # Counting
//! `written()` only grows by the inserted count the backend reports, including
//! the partial count carried by a [`DocShellError::BulkWrite`] failure.

use tracing::{debug, error, warn};

use crate::backend::{BulkBackend, Document, WriteMode};
use crate::config::BatchSettings;
use crate::error::{DocShellError, Result};

pub mod jsonl;
pub mod pipeline;
pub mod transform;

pub use pipeline::{feed, FnSink, PrintSink, PushConsumer, Stage};

/// Default number of documents per batch
pub const DEFAULT_WRITE_LIMIT: usize = 1000;

// Upper bound for the pending buffer's preallocation
const MAX_PREALLOCATED: usize = 1024;

type Transform = Box<dyn FnMut(Document) -> Document + Send>;
type Feedback = Box<dyn FnMut(&Document) + Send>;

/// Batch writer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No documents pending
    Idle,
    /// Some documents pending, fewer than the write limit
    Accumulating,
    /// Executing a batch against the backend
    Flushing,
    /// Closed by the producer
    Closed,
}

/// Accumulates pushed documents and writes them in fixed-size batches
pub struct BatchWriter<B: BulkBackend> {
    backend: B,
    write_limit: usize,
    mode: WriteMode,
    transform: Option<Transform>,
    feedback: Option<Feedback>,
    pending: Vec<Document>,
    written: u64,
    batches: u64,
    state: BatchState,
}

impl<B: BulkBackend> BatchWriter<B> {
    /// Open a writer with an empty batch against `backend`
    ///
    /// `write_limit` must be at least 1. The writer starts in unordered mode
    /// with no transform and no feedback callback.
    pub fn open(backend: B, write_limit: usize) -> Result<Self> {
        if write_limit == 0 {
            return Err(DocShellError::invalid_input("write_limit must be at least 1"));
        }

        debug!(namespace = %backend.namespace(), write_limit, "opening batch writer");

        Ok(Self {
            backend,
            write_limit,
            mode: WriteMode::default(),
            transform: None,
            feedback: None,
            pending: Self::fresh_batch(write_limit),
            written: 0,
            batches: 0,
            state: BatchState::Idle,
        })
    }

    /// Open a writer configured from settings
    pub fn from_settings(backend: B, settings: &BatchSettings) -> Result<Self> {
        Ok(Self::open(backend, settings.write_limit)?.with_mode(settings.mode()))
    }

    /// Set the ordering mode used for every batch
    #[must_use]
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Transform every document before it joins the batch
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: FnMut(Document) -> Document + Send + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Observe every pushed document, before the transform runs
    #[must_use]
    pub fn with_feedback<F>(mut self, feedback: F) -> Self
    where
        F: FnMut(&Document) + Send + 'static,
    {
        self.feedback = Some(Box::new(feedback));
        self
    }

    /// Push one document
    ///
    /// Executes the batch synchronously once it holds `write_limit` documents.
    /// A document rejected by the backend's document check is not appended and
    /// is reported as [`DocShellError::InvalidDocument`].
    pub fn push(&mut self, doc: Document) -> Result<()> {
        if self.state == BatchState::Closed {
            return Err(DocShellError::invalid_input("push on a closed batch writer"));
        }

        if let Some(feedback) = self.feedback.as_mut() {
            feedback(&doc);
        }

        let doc = match self.transform.as_mut() {
            Some(transform) => transform(doc),
            None => doc,
        };

        if let Err(err) = self.backend.check_document(&doc) {
            error!(
                namespace = %self.backend.namespace(),
                position = self.pending.len(),
                error = %err,
                "rejected document"
            );
            return Err(err);
        }

        self.pending.push(doc);
        self.state = BatchState::Accumulating;

        if self.pending.len() == self.write_limit {
            self.execute_pending()?;
        }
        Ok(())
    }

    /// Flush any pending documents and close the writer
    ///
    /// Calling `close` on a closed writer does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.state == BatchState::Closed {
            return Ok(());
        }

        let result = if self.pending.is_empty() { Ok(()) } else { self.execute_pending() };
        self.state = BatchState::Closed;

        debug!(
            namespace = %self.backend.namespace(),
            written = self.written,
            batches = self.batches,
            "batch writer closed"
        );
        result
    }

    /// Total documents confirmed by the backend so far
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Number of batches executed so far
    #[must_use]
    pub const fn batches(&self) -> u64 {
        self.batches
    }

    /// Number of documents waiting in the current batch
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub const fn state(&self) -> BatchState {
        self.state
    }

    #[must_use]
    pub const fn write_limit(&self) -> usize {
        self.write_limit
    }

    #[must_use]
    pub const fn mode(&self) -> WriteMode {
        self.mode
    }

    /// The backend batches are written to
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    fn fresh_batch(write_limit: usize) -> Vec<Document> {
        Vec::with_capacity(write_limit.min(MAX_PREALLOCATED))
    }

    fn execute_pending(&mut self) -> Result<()> {
        let batch = std::mem::replace(&mut self.pending, Self::fresh_batch(self.write_limit));
        let size = batch.len();
        let number = self.batches + 1;

        self.state = BatchState::Flushing;
        debug!(
            namespace = %self.backend.namespace(),
            batch = number,
            size,
            mode = %self.mode,
            "executing bulk insert"
        );

        let outcome = self.backend.bulk_insert(batch, self.mode);
        self.batches = number;
        self.state = BatchState::Idle;

        match outcome {
            Ok(result) => {
                if result.inserted < size as u64 {
                    warn!(
                        namespace = %self.backend.namespace(),
                        batch = number,
                        size,
                        inserted = result.inserted,
                        "backend confirmed fewer documents than sent"
                    );
                }
                self.written += result.inserted;
                Ok(())
            }
            Err(err) => {
                if let Some(inserted) = err.inserted_before_failure() {
                    self.written += inserted;
                }
                error!(
                    namespace = %self.backend.namespace(),
                    batch = number,
                    size,
                    error = %err,
                    "bulk insert failed"
                );
                Err(err)
            }
        }
    }
}

impl<B: BulkBackend> Drop for BatchWriter<B> {
    fn drop(&mut self) {
        if self.state == BatchState::Closed {
            return;
        }
        if !self.pending.is_empty() {
            warn!(
                namespace = %self.backend.namespace(),
                pending = self.pending.len(),
                "batch writer dropped without close; flushing"
            );
        }
        if let Err(err) = self.close() {
            error!(error = %err, "flush on drop failed");
        }
    }
}

impl<B: BulkBackend> std::fmt::Debug for BatchWriter<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWriter")
            .field("namespace", &self.backend.namespace())
            .field("write_limit", &self.write_limit)
            .field("mode", &self.mode)
            .field("pending", &self.pending.len())
            .field("written", &self.written)
            .field("batches", &self.batches)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryCollection;
    use crate::backend::{BulkWriteFailure, BulkWriteResult, WriteError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn doc(v: usize) -> Document {
        json!({ "v": v }).as_object().cloned().unwrap()
    }

    /// Backend that confirms only part of each batch
    struct LossyBackend {
        confirm: u64,
    }

    impl BulkBackend for LossyBackend {
        fn namespace(&self) -> String {
            "lossy".to_string()
        }

        fn bulk_insert(&self, docs: Vec<Document>, _mode: WriteMode) -> Result<BulkWriteResult> {
            let inserted = self.confirm.min(docs.len() as u64);
            Err(DocShellError::BulkWrite(BulkWriteFailure {
                inserted,
                write_errors: vec![WriteError::new(inserted as usize, 11000, "dup")],
            }))
        }
    }

    #[test]
    fn test_zero_write_limit_rejected() {
        let coll = MemoryCollection::new("t");
        assert!(matches!(
            BatchWriter::open(&coll, 0).unwrap_err(),
            DocShellError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_state_transitions() {
        let coll = MemoryCollection::new("t");
        let mut writer = BatchWriter::open(&coll, 2).unwrap();
        assert_eq!(writer.state(), BatchState::Idle);

        writer.push(doc(0)).unwrap();
        assert_eq!(writer.state(), BatchState::Accumulating);
        assert_eq!(writer.pending(), 1);

        writer.push(doc(1)).unwrap();
        assert_eq!(writer.state(), BatchState::Idle);
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.written(), 2);

        writer.close().unwrap();
        assert_eq!(writer.state(), BatchState::Closed);
        assert!(matches!(writer.push(doc(2)).unwrap_err(), DocShellError::InvalidInput(_)));
    }

    #[test]
    fn test_threshold_flush_and_close_remainder() {
        let coll = MemoryCollection::new("t");
        let mut writer = BatchWriter::open(&coll, 3).unwrap();
        for v in 0..7 {
            writer.push(doc(v)).unwrap();
        }
        assert_eq!(coll.batch_sizes(), vec![3, 3]);

        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(coll.batch_sizes(), vec![3, 3, 1]);
        assert_eq!(writer.written(), 7);
        assert_eq!(writer.batches(), 3);
    }

    #[test]
    fn test_feedback_runs_before_transform() {
        let coll = MemoryCollection::new("t");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let mut writer = BatchWriter::open(&coll, 10)
            .unwrap()
            .with_feedback(move |d| {
                assert!(d.contains_key("v"));
                assert!(!d.contains_key("tagged"));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .with_transform(|mut d| {
                d.insert("tagged".to_string(), json!(true));
                d
            });

        writer.push(doc(1)).unwrap();
        writer.push(doc(2)).unwrap();
        writer.close().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(coll.find_all().iter().all(|d| d["tagged"] == json!(true)));
    }

    #[test]
    fn test_invalid_document_not_appended() {
        let coll = MemoryCollection::new("t");
        let mut writer = BatchWriter::open(&coll, 10).unwrap();
        let bad = json!({"$where": 1}).as_object().cloned().unwrap();

        let err = writer.push(bad).unwrap_err();
        assert!(matches!(err, DocShellError::InvalidDocument(_)));
        assert_eq!(writer.pending(), 0);

        writer.push(doc(1)).unwrap();
        writer.close().unwrap();
        assert_eq!(coll.count(), 1);
    }

    #[test]
    fn test_partial_failure_counts_confirmed_only() {
        let backend = LossyBackend { confirm: 3 };
        let mut writer = BatchWriter::open(&backend, 5).unwrap();
        for v in 0..4 {
            writer.push(doc(v)).unwrap();
        }
        let err = writer.push(doc(4)).unwrap_err();

        assert!(matches!(err, DocShellError::BulkWrite(_)));
        assert_eq!(writer.written(), 3);
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.state(), BatchState::Idle);
        writer.close().unwrap();
    }

    #[test]
    fn test_drop_flushes_remainder() {
        let coll = MemoryCollection::new("t");
        {
            let mut writer = BatchWriter::open(&coll, 10).unwrap();
            writer.push(doc(1)).unwrap();
            writer.push(doc(2)).unwrap();
        }
        assert_eq!(coll.batch_sizes(), vec![2]);
    }

    #[test]
    fn test_from_settings() {
        let coll = MemoryCollection::new("t");
        let settings = BatchSettings { write_limit: 25, ordered: true };
        let writer = BatchWriter::from_settings(&coll, &settings).unwrap();
        assert_eq!(writer.write_limit(), 25);
        assert_eq!(writer.mode(), WriteMode::Ordered);
    }
}
