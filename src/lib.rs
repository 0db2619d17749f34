//! DocShell - Paged Output and Batched Loading for a Document Shell
//!
//! DocShell provides the two output-side building blocks of an interactive
//! document-database shell: a terminal pager for long results and a batched
//! bulk writer for loading large streams of documents.
//!
//! # Core Principles
//! - Lazy rendering (a source is only pulled as far as the user reads)
//! - Rows never exceed the terminal width, numbers never reset mid-render
//! - Quitting and Ctrl-C are outcomes, not errors
//! - Batches are bounded (`write_limit` documents per bulk insert)
//! - Counts reflect what the backend confirmed, even on partial failure
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON output envelope types
//! - [`pager`] - Paginated, numbered, width-wrapped terminal rendering
//! - [`batch`] - Batched bulk writing and push-based document pipelines
//! - [`backend`] - Bulk insert backends (in-memory, `SQLite`)
//! - [`config`] - Configuration management
//!
//! # Public API
//! - Rendering: [`Pager`], [`PagerSettings`], [`RenderOutcome`]
//! - Loading: [`BatchWriter`], [`BulkBackend`], [`WriteMode`]
//! - Envelopes: [`SuccessEnvelope`], [`ErrorEnvelope`]
//! - Errors: [`DocShellError`]

pub mod backend; // Bulk insert backends
pub mod batch; // Batched writer and pipelines
pub mod config; // Configuration management
pub mod error; // Error handling infrastructure
pub mod output; // JSON output envelopes
pub mod pager; // Terminal pager

// Re-export commonly used types for convenience
pub use backend::memory::MemoryCollection;
#[cfg(feature = "sqlite")]
pub use backend::sqlite::SqliteCollection;
pub use backend::{
    BulkBackend, BulkWriteFailure, BulkWriteResult, Document, WriteError, WriteMode,
};
pub use batch::{feed, BatchState, BatchWriter, PushConsumer, DEFAULT_WRITE_LIMIT};
pub use config::{
    load_config, load_with_precedence, save_config, BatchSettings, ConfigLocation, PagerSettings,
    ShellConfig,
};
pub use error::{DocShellError, Result};
pub use output::{ErrorEnvelope, ErrorInfo, LoadReport, Metadata, SuccessEnvelope};
pub use pager::{InterruptFlag, Pager, RenderOutcome, TerminalSize};
