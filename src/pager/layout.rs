//! Row layout: line numbering, width-based wrapping and page geometry.
//!
//! Widths are terminal display columns (`unicode-width`), so for ASCII text a
//! column is a character. Tabs are expanded to spaces before wrapping and any
//! other control character counts as one column.

use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

use crate::error::{DocShellError, Result};
use crate::pager::terminal::TerminalSize;

/// Narrowest number column, so short outputs still line up as `1  : `
pub const MIN_NUMBER_WIDTH: usize = 3;

/// Text between a row number and the row
pub const NUMBER_SEPARATOR: &str = ": ";

/// Columns between tab stops
pub const TAB_WIDTH: usize = 8;

/// Sequential row numbers
///
/// One number is consumed per rendered row, not per source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumbers {
    next: usize,
    enabled: bool,
}

impl LineNumbers {
    /// Numbering starting at `start`; a start of 0 disables numbering
    #[must_use]
    pub const fn new(start: usize) -> Self {
        Self { next: start, enabled: start > 0 }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { next: 0, enabled: false }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The number the next row will get
    #[must_use]
    pub const fn peek(&self) -> usize {
        self.next
    }

    /// Prefix for the next row, padded to `width` digits, consuming its number
    ///
    /// Returns an empty string when numbering is disabled.
    pub fn take_prefix(&mut self, width: usize) -> String {
        if !self.enabled {
            return String::new();
        }
        let prefix = format!("{:<width$}{NUMBER_SEPARATOR}", self.next);
        self.next = self.next.saturating_add(1);
        prefix
    }
}

/// Digits needed for `n`
#[must_use]
pub fn digits(n: usize) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// Number column width for a page whose last possible row is `last`
#[must_use]
pub fn number_width(last: usize) -> usize {
    digits(last).max(MIN_NUMBER_WIDTH)
}

/// Display columns taken by `ch`
#[must_use]
pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(1)
}

/// Replace tabs with spaces up to the next tab stop
///
/// Stops are counted from the start of `text`. Text without tabs is borrowed.
#[must_use]
pub fn expand_tabs(text: &str) -> Cow<'_, str> {
    if !text.contains('\t') {
        return Cow::Borrowed(text);
    }

    let mut expanded = String::with_capacity(text.len() + TAB_WIDTH);
    let mut column = 0;
    for ch in text.chars() {
        if ch == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            expanded.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            expanded.push(ch);
            column += char_width(ch);
        }
    }
    Cow::Owned(expanded)
}

/// Split `text` after as many characters as fit in `width` columns
///
/// A single character wider than `width` is taken on its own so that every
/// call makes progress on non-empty text.
#[must_use]
pub fn split_at_width(text: &str, width: usize) -> (&str, &str) {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        let w = char_width(ch);
        if used + w > width {
            let at = if idx == 0 { ch.len_utf8() } else { idx };
            return text.split_at(at);
        }
        used += w;
    }
    (text, "")
}

/// Wrap `text` into rows of at most `width` columns
///
/// An empty string yields one empty row.
#[must_use]
pub fn wrap(text: &str, width: usize) -> Vec<&str> {
    let mut rows = Vec::new();
    let mut rest = text;
    loop {
        let (head, tail) = split_at_width(rest, width);
        rows.push(head);
        if tail.is_empty() {
            return rows;
        }
        rest = tail;
    }
}

/// Geometry of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Terminal size the page was laid out for
    pub size: TerminalSize,

    /// Prompt text wrapped to the terminal width (empty when not paginating)
    pub prompt_rows: Vec<String>,

    /// Output rows that fit above the prompt
    pub capacity: usize,

    /// Padding width of row numbers on this page (0 when numbering is off)
    pub number_width: usize,

    /// Columns left for content after the number prefix
    pub usable_width: usize,
}

impl PageLayout {
    /// Lay out a page for `size`
    ///
    /// `prompt` is `None` when pagination is off. Fails when the terminal is
    /// shorter than 2 rows, when the wrapped prompt leaves no output row, or
    /// when the number prefix leaves no content column.
    pub fn compute(size: TerminalSize, prompt: Option<&str>, numbers: &LineNumbers) -> Result<Self> {
        if size.rows < 2 {
            return Err(DocShellError::pagination(format!(
                "terminal has {} row(s); at least 2 are needed for output and prompt",
                size.rows
            )));
        }
        if size.columns == 0 {
            return Err(DocShellError::pagination("terminal has no columns"));
        }

        let prompt_rows: Vec<String> = match prompt {
            Some(text) => {
                let mut rows: Vec<String> = text
                    .lines()
                    .flat_map(|line| wrap(line, size.columns))
                    .map(str::to_string)
                    .collect();
                if rows.is_empty() {
                    rows.push(String::new());
                }
                rows
            }
            None => Vec::new(),
        };

        if prompt_rows.len() >= size.rows {
            return Err(DocShellError::pagination(format!(
                "prompt needs {} row(s) but the terminal only has {}",
                prompt_rows.len(),
                size.rows
            )));
        }
        let capacity = size.rows - prompt_rows.len();

        let (number_width, usable_width) = if numbers.is_enabled() {
            let width = number_width(numbers.peek().saturating_add(capacity - 1));
            let prefix = width + NUMBER_SEPARATOR.len();
            if prefix >= size.columns {
                return Err(DocShellError::pagination(format!(
                    "terminal is {} column(s) wide; line numbers need {}",
                    size.columns,
                    prefix + 1
                )));
            }
            (width, size.columns - prefix)
        } else {
            (0, size.columns)
        };

        Ok(Self { size, prompt_rows, capacity, number_width, usable_width })
    }
}
