//! Ctrl-C observed by the render loop.
//!
//! The flag is checked before every rendered row, and [`StdinInput`] polls it
//! while waiting for a prompt answer. Raising it makes the current render stop
//! cleanly with [`RenderOutcome::Interrupted`](super::RenderOutcome::Interrupted).
//!
//! A render blocked inside its source (a pipe that never produces another
//! line) cannot observe the flag. A second Ctrl-C while the flag is still
//! raised therefore ends the process with status 130, after writing the
//! closing marker of any mirror file still open.
//!
//! [`StdinInput`]: super::StdinInput

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::error::{DocShellError, Result};
use crate::pager::mirror;

/// Exit status after a forced interrupt (128 + SIGINT)
pub const INTERRUPTED_EXIT_STATUS: i32 = 130;

/// Mirror file whose closing marker has not been written yet
pub type MirrorSlot = Arc<Mutex<Option<PathBuf>>>;

/// Shared interrupt flag
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
    open_mirror: MirrorSlot,
}

impl InterruptFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was raised
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }

    /// Slot a [`FileMirror`](super::FileMirror) keeps its open file in
    #[must_use]
    pub fn mirror_slot(&self) -> MirrorSlot {
        Arc::clone(&self.open_mirror)
    }

    /// Handle one Ctrl-C; returns `true` when the process should exit now
    ///
    /// The first press raises the flag. A press while it is still raised
    /// closes the tracked mirror file and asks for exit.
    pub fn on_ctrlc(&self) -> bool {
        if !self.raised.swap(true, Ordering::SeqCst) {
            return false;
        }

        let owed = self.open_mirror.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(path) = owed {
            if let Err(err) = mirror::append_closing_marker(&path) {
                warn!(error = %err, "failed to close mirror file on exit");
            }
        }
        true
    }

    /// Route the process's Ctrl-C to this flag
    ///
    /// Can be installed once per process.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            if flag.on_ctrlc() {
                std::process::exit(INTERRUPTED_EXIT_STATUS);
            }
        })
        .map_err(|e| DocShellError::config_error(format!("Could not install Ctrl-C handler: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::FileMirror;
    use std::fs;

    #[test]
    fn test_take_clears() {
        let flag = InterruptFlag::new();
        assert!(!flag.take());

        let shared = flag.clone();
        shared.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!shared.is_raised());
    }

    #[test]
    fn test_second_ctrlc_asks_for_exit() {
        let flag = InterruptFlag::new();
        assert!(!flag.on_ctrlc());
        assert!(flag.is_raised());
        assert!(flag.on_ctrlc());

        // A render that consumed the first press starts the count again
        flag.take();
        assert!(!flag.on_ctrlc());
    }

    #[test]
    fn test_forced_exit_closes_open_mirror_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let flag = InterruptFlag::new();

        let mut mirror = FileMirror::new();
        mirror.track(flag.mirror_slot());
        mirror.assign(Some(path.clone())).unwrap();
        mirror.write_line("first").unwrap();

        assert!(!flag.on_ctrlc());
        assert!(flag.on_ctrlc());
        drop(mirror);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("# opening"));
        assert_eq!(lines[1], "first");
        assert!(lines[2].starts_with("# closing"));
    }

    #[test]
    fn test_forced_exit_without_mirror() {
        let flag = InterruptFlag::new();
        flag.raise();
        assert!(flag.on_ctrlc());
        assert!(flag.mirror_slot().lock().unwrap().is_none());
    }
}
