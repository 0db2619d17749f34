//! Reusable document transforms for [`BatchWriter::with_transform`](super::BatchWriter::with_transform)
//! and pipeline [`Stage`](super::Stage)s.

use serde_json::Value;

use crate::backend::Document;

/// Return the document unchanged
#[must_use]
pub fn identity(doc: Document) -> Document {
    doc
}

/// Wrap each document as the value of a single outer field
pub fn embed_under(field: impl Into<String>) -> impl Fn(Document) -> Document + Clone + Send + Sync {
    let field = field.into();
    move |doc| {
        let mut outer = Document::new();
        outer.insert(field.clone(), Value::Object(doc));
        outer
    }
}

/// Set `name` to `value` on each document, replacing any existing value
pub fn add_field(
    name: impl Into<String>,
    value: Value,
) -> impl Fn(Document) -> Document + Clone + Send + Sync {
    let name = name.into();
    move |mut doc| {
        doc.insert(name.clone(), value.clone());
        doc
    }
}

/// Move the value of `old` to `new`; documents without `old` pass through
pub fn rename_field(
    old: impl Into<String>,
    new: impl Into<String>,
) -> impl Fn(Document) -> Document + Clone + Send + Sync {
    let (old, new) = (old.into(), new.into());
    move |mut doc| {
        if let Some(value) = doc.remove(&old) {
            doc.insert(new.clone(), value);
        }
        doc
    }
}
