//! Terminal size probing.
//!
//! Size resolution mirrors the usual shell conventions:
//! 1. `COLUMNS` / `LINES` environment variables, when they hold positive integers
//! 2. the size reported by the terminal (only when stdout is a terminal)
//! 3. the 80x24 fallback, per dimension

use std::io::IsTerminal;

/// Size used when nothing better is known
pub const FALLBACK_SIZE: TerminalSize = TerminalSize { columns: 80, rows: 24 };

/// Terminal dimensions in columns and rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub columns: usize,
    pub rows: usize,
}

impl TerminalSize {
    #[must_use]
    pub const fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    /// Query the current terminal
    #[must_use]
    pub fn detect() -> Self {
        let queried = if std::io::stdout().is_terminal() {
            crossterm::terminal::size().ok()
        } else {
            None
        };
        Self::resolve(env_dimension("COLUMNS"), env_dimension("LINES"), queried)
    }

    fn resolve(env_columns: Option<usize>, env_rows: Option<usize>, queried: Option<(u16, u16)>) -> Self {
        let (queried_columns, queried_rows) = match queried {
            Some((c, r)) => (usize::from(c), usize::from(r)),
            None => (0, 0),
        };

        let pick = |env: Option<usize>, queried: usize, fallback: usize| match env {
            Some(n) => n,
            None if queried > 0 => queried,
            None => fallback,
        };

        Self {
            columns: pick(env_columns, queried_columns, FALLBACK_SIZE.columns),
            rows: pick(env_rows, queried_rows, FALLBACK_SIZE.rows),
        }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        FALLBACK_SIZE
    }
}

fn env_dimension(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// Source of terminal dimensions, consulted before every page
pub trait TerminalProbe {
    fn size(&mut self) -> TerminalSize;
}

/// A fixed size, for tests and non-interactive output
impl TerminalProbe for TerminalSize {
    fn size(&mut self) -> TerminalSize {
        *self
    }
}

/// Probe the real terminal every time
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectTerminal;

impl TerminalProbe for DetectTerminal {
    fn size(&mut self) -> TerminalSize {
        TerminalSize::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_environment() {
        let size = TerminalSize::resolve(Some(100), Some(40), Some((120, 50)));
        assert_eq!(size, TerminalSize::new(100, 40));
    }

    #[test]
    fn test_resolve_uses_queried_size() {
        let size = TerminalSize::resolve(None, Some(30), Some((120, 50)));
        assert_eq!(size, TerminalSize::new(120, 30));
    }

    #[test]
    fn test_resolve_falls_back_per_dimension() {
        assert_eq!(TerminalSize::resolve(None, None, None), FALLBACK_SIZE);
        assert_eq!(TerminalSize::resolve(None, None, Some((0, 0))), FALLBACK_SIZE);
        assert_eq!(TerminalSize::resolve(None, None, Some((132, 0))), TerminalSize::new(132, 24));
    }

    #[test]
    fn test_fixed_probe() {
        let mut probe = TerminalSize::new(20, 24);
        assert_eq!(probe.size(), TerminalSize::new(20, 24));
        assert_eq!(TerminalSize::default(), FALLBACK_SIZE);
    }
}
