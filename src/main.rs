//! DocShell CLI Entry Point
//!
//! Subcommands:
//! - `page` - Page a text file (or stdin) through the terminal pager
//! - `show` - Page a JSON-lines file as documents
//! - `load` - Bulk-load a JSON-lines file into a collection in batches
//! - `scan` - Page every document of a stored collection
//!
//! `load` prints one JSON envelope to stdout. Logs go to stderr
//! (`DOCSHELL_LOG`, default `warn`).

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;

use docshell::batch::jsonl::{self, read_documents, LoadFailure};
use docshell::batch::transform::embed_under;
use docshell::{
    BatchSettings, BatchWriter, BulkBackend, DocShellError, Document, ErrorEnvelope,
    InterruptFlag, LoadReport, MemoryCollection, Metadata, Pager, PagerSettings, RenderOutcome,
    ShellConfig, SuccessEnvelope,
};

/// Documents between two progress log events while loading
const PROGRESS_EVERY: u64 = 10_000;

/// DocShell - paged output and batched loading for document collections
#[derive(Parser)]
#[command(name = "docshell")]
#[command(about = "Page long output and bulk-load documents in batches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page a text file ("-" for stdin)
    Page {
        file: PathBuf,

        #[command(flatten)]
        pager: PagerArgs,
    },

    /// Page the documents of a JSON-lines file
    Show {
        file: PathBuf,

        #[command(flatten)]
        pager: PagerArgs,
    },

    /// Load a JSON-lines file ("-" for stdin) into a collection
    Load {
        file: PathBuf,

        /// SQLite database file; without it documents go to a throwaway in-memory collection
        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long)]
        collection: String,

        /// Documents per bulk insert
        #[arg(long)]
        write_limit: Option<usize>,

        /// Stop each batch at its first failing document
        #[arg(long)]
        ordered: bool,

        /// Wrap every document as `{FIELD: <document>}` before inserting it
        #[arg(long, value_name = "FIELD")]
        embed_under: Option<String>,
    },

    /// Page every document of a stored collection, in insertion order
    Scan {
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        collection: String,

        #[command(flatten)]
        pager: PagerArgs,
    },
}

/// Flags overriding the pager section of the config files
#[derive(Args, Debug, Default)]
struct PagerArgs {
    /// Write everything without pausing
    #[arg(long)]
    no_paginate: bool,

    #[arg(long)]
    no_line_numbers: bool,

    /// Number of the first row
    #[arg(long, value_name = "N")]
    first_line_number: Option<usize>,

    /// Also append every line to FILE
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Text shown after each full page
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Print documents on a single line
    #[arg(long)]
    flat: bool,
}

impl PagerArgs {
    fn apply(self, settings: &mut PagerSettings) {
        if self.no_paginate {
            settings.paginate = false;
        }
        if self.no_line_numbers {
            settings.line_numbers = false;
        }
        if let Some(first) = self.first_line_number {
            settings.first_line_number = first;
        }
        if let Some(output) = self.output {
            settings.output_filename = Some(output);
        }
        if let Some(prompt) = self.prompt {
            settings.paginate_prompt = prompt;
        }
        if self.flat {
            settings.pretty_print = false;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("DOCSHELL_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("docshell: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = docshell::load_with_precedence().context("loading configuration")?;

    match cli.command {
        Commands::Page { file, pager } => {
            let from_stdin = is_stdin(&file);
            let mut pager = open_pager(&config, pager, from_stdin)?;
            let reader = open_input(&file)?;

            let mut failure = None;
            let lines = reader.lines().map_while(|line| line.map_err(|e| failure = Some(e)).ok());
            let outcome = pager.render_lines(lines)?;
            if let Some(err) = failure {
                return Err(err).context(format!("reading {}", file.display()));
            }
            Ok(exit_code(outcome))
        }

        Commands::Show { file, pager } => {
            let mut pager = open_pager(&config, pager, is_stdin(&file))?;
            let reader = open_input(&file)?;

            let mut failure = None;
            let docs =
                read_documents(reader).map_while(|doc| doc.map_err(|e| failure = Some(e)).ok());
            let outcome = pager.render_cursor(docs, None)?;
            if let Some(err) = failure {
                return Err(err.into());
            }
            Ok(exit_code(outcome))
        }

        Commands::Load { file, db, collection, write_limit, ordered, embed_under: embed } => {
            let mut settings = config.batch;
            if let Some(limit) = write_limit {
                settings.write_limit = limit;
            }
            if ordered {
                settings.ordered = true;
            }

            let backend_name = if db.is_some() { "sqlite" } else { "memory" };
            let started = Instant::now();
            let result = open_input(&file)
                .map_err(|e| LoadFailure::from(DocShellError::invalid_input(format!("{e:#}"))))
                .and_then(|reader| load(reader, db.as_deref(), &collection, &settings, embed));
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(report) => {
                    let meta = Metadata::with_documents(elapsed, report.written);
                    let envelope = SuccessEnvelope::new(backend_name, "load", report, meta);
                    println!("{}", serde_json::to_string(&envelope)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(failure) => {
                    warn!(written = failure.written, error = %failure.error, "load failed");
                    let envelope = ErrorEnvelope::from_error(backend_name, "load", &failure.error)
                        .with_written(failure.written);
                    println!("{}", serde_json::to_string(&envelope)?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Scan { db, collection, pager } => {
            let docs = scan(&db, &collection)?;
            let mut pager = open_pager(&config, pager, false)?;
            Ok(exit_code(pager.render_cursor(docs, None)?))
        }
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    if is_stdin(path) {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Pager on stdout with config, flags and the terminal situation applied
///
/// Pagination is switched off when stdout is not a terminal, or when the
/// source itself is stdin (the prompt could not be answered).
fn open_pager(config: &ShellConfig, args: PagerArgs, source_is_stdin: bool) -> anyhow::Result<Pager> {
    let mut settings = config.pager.clone();
    args.apply(&mut settings);

    if settings.paginate && (source_is_stdin || !io::stdout().is_terminal()) {
        debug!(source_is_stdin, "pagination disabled");
        settings.paginate = false;
    }

    let mut pager = Pager::new(settings)?;
    let interrupt = InterruptFlag::new();
    interrupt.install_ctrlc_handler()?;
    pager.set_interrupt(interrupt);
    Ok(pager)
}

fn exit_code(outcome: RenderOutcome) -> ExitCode {
    match outcome {
        RenderOutcome::Completed | RenderOutcome::Quit => ExitCode::SUCCESS,
        // Conventional 128 + SIGINT
        RenderOutcome::Interrupted => ExitCode::from(130),
    }
}

fn load(
    reader: impl BufRead,
    db: Option<&Path>,
    collection: &str,
    settings: &BatchSettings,
    embed: Option<String>,
) -> Result<LoadReport, LoadFailure> {
    settings.validate()?;

    match db {
        #[cfg(feature = "sqlite")]
        Some(path) => {
            let backend = docshell::SqliteCollection::open(path, collection)?;
            load_into(&backend, reader, settings, embed)
        }
        #[cfg(not(feature = "sqlite"))]
        Some(_) => Err(DocShellError::config_error("this build has no SQLite support").into()),
        None => load_into(&MemoryCollection::new(collection), reader, settings, embed),
    }
}

fn load_into<B: BulkBackend>(
    backend: B,
    reader: impl BufRead,
    settings: &BatchSettings,
    embed: Option<String>,
) -> Result<LoadReport, LoadFailure> {
    let namespace = backend.namespace();
    let mut writer =
        BatchWriter::from_settings(backend, settings)?.with_feedback(progress(namespace.clone()));
    if let Some(field) = embed {
        writer = writer.with_transform(embed_under(field));
    }

    let read = jsonl::load(&mut writer, reader)?;

    info!(%namespace, read, written = writer.written(), batches = writer.batches(), "load finished");
    Ok(LoadReport {
        namespace,
        read,
        written: writer.written(),
        batches: writer.batches(),
        write_limit: writer.write_limit(),
        mode: writer.mode(),
    })
}

fn progress(namespace: String) -> impl FnMut(&Document) + Send + 'static {
    let mut seen = 0u64;
    move |_: &Document| {
        seen += 1;
        if seen % PROGRESS_EVERY == 0 {
            info!(%namespace, documents = seen, "loading");
        }
    }
}

#[cfg(feature = "sqlite")]
fn scan(db: &Path, collection: &str) -> docshell::Result<Vec<Document>> {
    docshell::SqliteCollection::open(db, collection)?.find_all()
}

#[cfg(not(feature = "sqlite"))]
fn scan(_db: &Path, _collection: &str) -> docshell::Result<Vec<Document>> {
    Err(DocShellError::config_error("this build has no SQLite support"))
}
