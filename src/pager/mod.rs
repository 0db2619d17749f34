//! Terminal Pager
//!
//! The pager renders an arbitrary, possibly endless sequence of text lines to a
//! terminal one page at a time.
//!
//! # Rendering
//! - Every source line is wrapped into rows no wider than the terminal, after
//!   the optional `"<n>  : "` number prefix; tabs are expanded to spaces first
//! - Numbers count rows, not source lines, and never reset within one render
//! - A page holds `rows - prompt_rows` rows; the prompt itself is wrapped too
//! - The terminal is measured again before every page, so a resize applies to
//!   the next page (a line straddling the boundary is re-wrapped)
//! - Answering `q`, `quit` or `exit` stops rendering; nothing further is read
//!   from the source
//!
//! # Mirroring
//! With an output file assigned, every source line (not every row) is also
//! appended to the file. See [`mirror`] for the marker format.
//!
//! # Outcomes
//! Quitting and Ctrl-C are not errors; every render returns a
//! [`RenderOutcome`] after releasing the mirror file.

use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backend::Document;
use crate::config::{validate_prompt, PagerSettings};
use crate::error::{DocShellError, Result};

pub mod input;
pub mod interrupt;
pub mod layout;
pub mod mirror;
pub mod terminal;

pub use input::{is_quit, LineInput, ScriptedInput, StdinInput};
pub use interrupt::InterruptFlag;
pub use layout::{expand_tabs, split_at_width, LineNumbers, PageLayout};
pub use mirror::FileMirror;
pub use terminal::{DetectTerminal, TerminalProbe, TerminalSize};

/// Custom document formatter for [`Pager::render_record`] and [`Pager::render_cursor`]
pub type Formatter<'a> = &'a dyn Fn(&Document) -> String;

/// How a render ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The source was exhausted
    Completed,
    /// The user answered the prompt with a quit word (or input ended)
    Quit,
    /// Ctrl-C was observed
    Interrupted,
}

/// Paginating renderer writing to `W` and reading prompt answers from `I`
pub struct Pager<W: Write = Stdout, I: LineInput = StdinInput> {
    settings: PagerSettings,
    out: W,
    input: I,
    probe: Box<dyn TerminalProbe + Send>,
    mirror: FileMirror,
    interrupt: InterruptFlag,
}

impl Pager {
    /// Pager on standard output and standard input
    pub fn new(settings: PagerSettings) -> Result<Self> {
        Self::with_io(settings, io::stdout(), StdinInput::new())
    }
}

impl<W: Write, I: LineInput> Pager<W, I> {
    /// Pager with explicit output and prompt input
    ///
    /// An output file named in `settings` is opened immediately.
    pub fn with_io(mut settings: PagerSettings, out: W, input: I) -> Result<Self> {
        settings.validate()?;
        let output_file = settings.output_filename.take();

        let mut pager = Self {
            settings,
            out,
            input,
            probe: Box::new(DetectTerminal),
            mirror: FileMirror::new(),
            interrupt: InterruptFlag::new(),
        };
        if let Some(path) = output_file {
            pager.set_output_file(path)?;
        }
        Ok(pager)
    }

    #[must_use]
    pub const fn settings(&self) -> &PagerSettings {
        &self.settings
    }

    pub fn set_paginate(&mut self, paginate: bool) {
        self.settings.paginate = paginate;
    }

    pub fn set_paginate_prompt(&mut self, prompt: impl Into<String>) -> Result<()> {
        let prompt = prompt.into();
        validate_prompt(&prompt)?;
        self.settings.paginate_prompt = prompt;
        Ok(())
    }

    pub fn set_line_numbers(&mut self, line_numbers: bool) {
        self.settings.line_numbers = line_numbers;
    }

    /// Number given to the first row of each render; 0 disables numbering
    pub fn set_first_line_number(&mut self, first: usize) {
        self.settings.first_line_number = first;
    }

    pub fn set_pretty_print(&mut self, pretty_print: bool) {
        self.settings.pretty_print = pretty_print;
    }

    /// The assigned mirror file
    #[must_use]
    pub fn output_file(&self) -> Option<&Path> {
        self.mirror.path()
    }

    /// Mirror output to `path`, closing any previously assigned file
    ///
    /// An empty path just closes the current file.
    pub fn set_output_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let result = self.mirror.assign(Some(path.into()));
        self.settings.output_filename = self.mirror.path().map(Path::to_path_buf);
        result
    }

    /// Close and unassign the mirror file
    pub fn close(&mut self) -> Result<()> {
        self.settings.output_filename = None;
        self.mirror.close()
    }

    /// Render every page at a fixed size instead of probing the terminal
    pub fn set_terminal_size(&mut self, size: TerminalSize) {
        self.probe = Box::new(size);
    }

    /// Use `probe` to measure the terminal before each page
    pub fn set_terminal_probe(&mut self, probe: impl TerminalProbe + Send + 'static) {
        self.probe = Box::new(probe);
    }

    /// Share an interrupt flag (for example one wired to Ctrl-C)
    ///
    /// The prompt input and the mirror file are tied to the same flag.
    pub fn set_interrupt(&mut self, interrupt: InterruptFlag) {
        self.input.set_interrupt(interrupt.clone());
        self.mirror.track(interrupt.mirror_slot());
        self.interrupt = interrupt;
    }

    #[must_use]
    pub const fn interrupt(&self) -> &InterruptFlag {
        &self.interrupt
    }

    #[must_use]
    pub const fn output(&self) -> &W {
        &self.out
    }

    #[must_use]
    pub const fn input(&self) -> &I {
        &self.input
    }

    /// Consume the pager, closing the mirror file, and return the output
    pub fn into_output(self) -> W {
        let Self { out, .. } = self;
        out
    }

    /// Render a sequence of lines
    ///
    /// The source is pulled lazily, one line at a time, only as rows are needed.
    pub fn render_lines<L>(&mut self, source: L) -> Result<RenderOutcome>
    where
        L: IntoIterator,
        L::Item: AsRef<str>,
    {
        let outcome = self.render_pages(source.into_iter());
        self.mirror.release();

        match &outcome {
            Ok(RenderOutcome::Interrupted) => info!("rendering interrupted"),
            Ok(outcome) => debug!(?outcome, "rendering finished"),
            Err(err) => warn!(error = %err, "rendering failed"),
        }
        outcome
    }

    /// Render one document
    ///
    /// Uses `formatter` when given, otherwise pretty or compact JSON depending
    /// on the `pretty_print` setting.
    pub fn render_record(
        &mut self,
        doc: &Document,
        formatter: Option<Formatter<'_>>,
    ) -> Result<RenderOutcome> {
        let lines = record_lines(doc, formatter, self.settings.pretty_print);
        self.render_lines(lines)
    }

    /// Render a sequence of documents as one continuous listing
    pub fn render_cursor<R>(
        &mut self,
        records: R,
        formatter: Option<Formatter<'_>>,
    ) -> Result<RenderOutcome>
    where
        R: IntoIterator<Item = Document>,
    {
        let pretty = self.settings.pretty_print;
        self.render_lines(
            records.into_iter().flat_map(move |doc| record_lines(&doc, formatter, pretty)),
        )
    }

    fn render_pages<S: AsRef<str>>(
        &mut self,
        mut source: impl Iterator<Item = S>,
    ) -> Result<RenderOutcome> {
        let mut numbers = if self.settings.numbering_enabled() {
            LineNumbers::new(self.settings.first_line_number)
        } else {
            LineNumbers::disabled()
        };
        // Source line being wrapped (tabs expanded), with the byte offset of its unrendered rest
        let mut current: Option<(String, usize)> = None;

        loop {
            let size = self.probe.size();
            let prompt = self.settings.paginate.then_some(self.settings.paginate_prompt.as_str());
            let layout = PageLayout::compute(size, prompt, &numbers)?;
            debug!(
                columns = size.columns,
                rows = size.rows,
                capacity = layout.capacity,
                first_row = numbers.peek(),
                "laying out page"
            );

            let mut page = Vec::with_capacity(layout.capacity);
            let mut filled = 0;
            let mut exhausted = false;

            while filled < layout.capacity {
                if self.interrupt.take() {
                    return Ok(RenderOutcome::Interrupted);
                }

                let (line, offset) = match current.take() {
                    Some(entry) => entry,
                    None => match source.next() {
                        Some(line) => {
                            let line = line.as_ref();
                            self.mirror.write_line(line)?;
                            (expand_tabs(line).into_owned(), 0)
                        }
                        None => {
                            exhausted = true;
                            break;
                        }
                    },
                };

                let (head, rest) = split_at_width(&line[offset..], layout.usable_width);
                let row = format!("{}{head}", numbers.take_prefix(layout.number_width));
                let next_offset = offset + head.len();
                if !rest.is_empty() {
                    current = Some((line, next_offset));
                }

                filled += 1;
                if self.settings.paginate {
                    page.push(row);
                } else {
                    self.write_row(&row)?;
                }
            }

            if !self.settings.paginate {
                if exhausted {
                    self.flush_output()?;
                    return Ok(RenderOutcome::Completed);
                }
                continue;
            }

            self.write_rows(&page)?;
            if exhausted {
                self.flush_output()?;
                return Ok(RenderOutcome::Completed);
            }

            self.write_prompt(&layout.prompt_rows)?;
            let answer = match self.input.read_line() {
                Ok(answer) => answer,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    self.interrupt.take();
                    self.write_row("")?;
                    return Ok(RenderOutcome::Interrupted);
                }
                Err(err) => {
                    return Err(DocShellError::output(format!("Could not read prompt answer: {err}")));
                }
            };

            if self.interrupt.take() {
                return Ok(RenderOutcome::Interrupted);
            }
            match answer {
                Some(answer) if is_quit(&answer) => return Ok(RenderOutcome::Quit),
                Some(_) => {}
                None => {
                    // No answer will ever come; end the prompt row
                    self.write_row("")?;
                    return Ok(RenderOutcome::Quit);
                }
            }
        }
    }

    fn write_row(&mut self, row: &str) -> Result<()> {
        writeln!(self.out, "{row}").map_err(terminal_error)
    }

    fn write_rows(&mut self, rows: &[String]) -> Result<()> {
        rows.iter().try_for_each(|row| self.write_row(row))
    }

    /// Prompt rows; the last one without a newline so the answer follows it
    fn write_prompt(&mut self, rows: &[String]) -> Result<()> {
        if let Some((last, head)) = rows.split_last() {
            self.write_rows(head)?;
            write!(self.out, "{last}").map_err(terminal_error)?;
        }
        self.flush_output()
    }

    fn flush_output(&mut self) -> Result<()> {
        self.out.flush().map_err(terminal_error)
    }
}

fn terminal_error(err: io::Error) -> DocShellError {
    DocShellError::output(format!("Could not write to terminal: {err}"))
}

/// Format a document as JSON text
#[must_use]
pub fn format_document(doc: &Document, pretty: bool) -> String {
    let formatted =
        if pretty { serde_json::to_string_pretty(doc) } else { serde_json::to_string(doc) };
    formatted.unwrap_or_else(|e| format!("<unprintable document: {e}>"))
}

/// Lines a document renders as
#[must_use]
pub fn record_lines(doc: &Document, formatter: Option<Formatter<'_>>, pretty: bool) -> Vec<String> {
    let text = match formatter {
        Some(format) => format(doc),
        None => format_document(doc, pretty),
    };
    text.lines().map(str::to_string).collect()
}
