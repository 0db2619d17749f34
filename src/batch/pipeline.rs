//! Push Pipelines
//!
//! A pipeline is a chain of [`PushConsumer`]s: each [`Stage`] transforms a
//! document and forwards it to the next consumer, ending in a sink such as a
//! [`BatchWriter`](super::BatchWriter), a [`PrintSink`] or an [`FnSink`].
//! Closing any stage closes everything downstream of it.
//!
//! ```
//! use docshell::backend::memory::MemoryCollection;
//! use docshell::batch::{transform, BatchWriter, PushConsumer, Stage};
//! use serde_json::json;
//!
//! let coll = MemoryCollection::new("people");
//! let writer = BatchWriter::open(&coll, 100).unwrap();
//! let mut pipe = Stage::new(transform::add_field("source", json!("import")), writer);
//!
//! pipe.push(json!({"name": "ada"}).as_object().cloned().unwrap()).unwrap();
//! pipe.close().unwrap();
//! assert_eq!(coll.count(), 1);
//! ```

use std::io::{self, Write};

use tracing::warn;

use crate::backend::{BulkBackend, Document};
use crate::batch::BatchWriter;
use crate::error::{DocShellError, Result};

/// Accepts pushed documents until closed
pub trait PushConsumer {
    /// Accept one document
    fn push(&mut self, doc: Document) -> Result<()>;

    /// Signal that no more documents will be pushed
    fn close(&mut self) -> Result<()>;
}

impl<B: BulkBackend> PushConsumer for BatchWriter<B> {
    fn push(&mut self, doc: Document) -> Result<()> {
        BatchWriter::push(self, doc)
    }

    fn close(&mut self) -> Result<()> {
        BatchWriter::close(self)
    }
}

impl<T: PushConsumer + ?Sized> PushConsumer for Box<T> {
    fn push(&mut self, doc: Document) -> Result<()> {
        (**self).push(doc)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T: PushConsumer + ?Sized> PushConsumer for &mut T {
    fn push(&mut self, doc: Document) -> Result<()> {
        (**self).push(doc)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Transforming stage that forwards to `next`
pub struct Stage<F, N> {
    actor: F,
    next: N,
    closed: bool,
}

impl<F, N> Stage<F, N>
where
    F: FnMut(Document) -> Document,
    N: PushConsumer,
{
    pub fn new(actor: F, next: N) -> Self {
        Self { actor, next, closed: false }
    }

    /// The downstream consumer
    pub fn next(&self) -> &N {
        &self.next
    }
}

impl<F, N> PushConsumer for Stage<F, N>
where
    F: FnMut(Document) -> Document,
    N: PushConsumer,
{
    fn push(&mut self, doc: Document) -> Result<()> {
        if self.closed {
            return Err(DocShellError::invalid_input("push on a closed pipeline stage"));
        }
        let doc = (self.actor)(doc);
        self.next.push(doc)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.next.close()
    }
}

/// Sink that pretty-prints each document
pub struct PrintSink<W: Write> {
    out: W,
}

impl PrintSink<io::Stdout> {
    /// Print to standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> PrintSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PushConsumer for PrintSink<W> {
    fn push(&mut self, doc: Document) -> Result<()> {
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| DocShellError::invalid_document(format!("cannot format document: {e}")))?;
        writeln!(self.out, "{text}")
            .map_err(|e| DocShellError::output(format!("Failed to print document: {e}")))
    }

    fn close(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| DocShellError::output(format!("Failed to flush output: {e}")))
    }
}

/// Sink that hands each document to a closure
pub struct FnSink<F> {
    f: F,
}

impl<F: FnMut(Document)> FnSink<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F: FnMut(Document)> PushConsumer for FnSink<F> {
    fn push(&mut self, doc: Document) -> Result<()> {
        (self.f)(doc);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Push every document from `docs` into `consumer`, then close it
///
/// The consumer is closed even when a push fails, so a partial batch still
/// reaches the backend; the push error is the one returned. Returns the number
/// of documents pushed successfully.
pub fn feed<I, C>(docs: I, consumer: &mut C) -> Result<u64>
where
    I: IntoIterator<Item = Document>,
    C: PushConsumer + ?Sized,
{
    let mut pushed = 0u64;
    for doc in docs {
        if let Err(err) = consumer.push(doc) {
            if let Err(close_err) = consumer.close() {
                warn!(error = %close_err, "close after failed push also failed");
            }
            return Err(err);
        }
        pushed += 1;
    }
    consumer.close()?;
    Ok(pushed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryCollection;
    use crate::batch::transform::{add_field, rename_field};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_stages_apply_in_order() {
        let mut seen = Vec::new();
        {
            let sink = FnSink::new(|d: Document| seen.push(d));
            let renamer = Stage::new(rename_field("hello", "goodbye"), sink);
            let mut adder = Stage::new(add_field("hello", json!({"key": "hole"})), renamer);
            for i in 0..3 {
                adder.push(doc(json!({"doc_id": i}))).unwrap();
            }
            adder.close().unwrap();
        }

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], doc(json!({"doc_id": 0, "goodbye": {"key": "hole"}})));
    }

    #[test]
    fn test_close_propagates_to_batch_writer() {
        let coll = MemoryCollection::new("t");
        let writer = BatchWriter::open(&coll, 10).unwrap();
        let mut pipe = Stage::new(|d| d, writer);

        pipe.push(doc(json!({"v": 1}))).unwrap();
        assert_eq!(coll.count(), 0);
        pipe.close().unwrap();
        assert_eq!(coll.count(), 1);
        assert_eq!(pipe.next().written(), 1);

        assert!(pipe.push(doc(json!({"v": 2}))).is_err());
    }

    #[test]
    fn test_print_sink_writes_pretty_json() {
        let mut sink = PrintSink::new(Vec::new());
        sink.push(doc(json!({"a": 1}))).unwrap();
        sink.close().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_feed_closes_after_failure() {
        let coll = MemoryCollection::new("t");
        let mut writer = BatchWriter::open(&coll, 10).unwrap();
        let docs = vec![doc(json!({"v": 1})), doc(json!({"$bad": 2})), doc(json!({"v": 3}))];

        let err = feed(docs, &mut writer).unwrap_err();
        assert!(matches!(err, DocShellError::InvalidDocument(_)));
        assert_eq!(coll.count(), 1);
        assert_eq!(writer.state(), crate::batch::BatchState::Closed);
    }

    #[test]
    fn test_feed_counts_pushed() {
        let coll = MemoryCollection::new("t");
        let mut writer = BatchWriter::open(&coll, 4).unwrap();
        let pushed = feed((0..10).map(|v| doc(json!({"v": v}))), &mut writer).unwrap();
        assert_eq!(pushed, 10);
        assert_eq!(coll.batch_sizes(), vec![4, 4, 2]);
    }
}
