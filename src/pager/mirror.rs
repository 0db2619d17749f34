//! Append-mode mirror of pager output.
//!
//! Assigning a file writes `# opening '<name>' <timestamp>`; unassigning it
//! (or dropping the mirror) writes `# closing '<name>' <timestamp>`. Timestamps
//! are UTC. Between the markers every source line is appended, newline
//! terminated and flushed.
//!
//! The handle itself is released after each render and reopened lazily, so a
//! file is never held open while the pager is idle.
//!
//! A mirror can publish its open file to a [`MirrorSlot`] so a forced exit on
//! Ctrl-C can still write the closing marker. Whoever takes the path out of the
//! slot owes the marker; it is never written twice.

use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{DocShellError, Result};
use crate::pager::interrupt::MirrorSlot;

/// Optional file receiving a copy of every rendered source line
#[derive(Debug, Default)]
pub struct FileMirror {
    path: Option<PathBuf>,
    file: Option<File>,
    slot: Option<MirrorSlot>,
}

impl FileMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The assigned file, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the file handle is currently open
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Publish the assigned file to `slot` from now on
    pub fn track(&mut self, slot: MirrorSlot) {
        if let Some(previous) = self.slot.take().filter(|previous| !Arc::ptr_eq(previous, &slot)) {
            lock(&previous).take();
        }
        *lock(&slot) = self.path.clone();
        self.slot = Some(slot);
    }

    /// Close the current file (closing marker) and assign `path` (opening marker)
    ///
    /// `None` or an empty path leaves the mirror unassigned.
    pub fn assign(&mut self, path: Option<PathBuf>) -> Result<()> {
        self.close()?;

        let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        let mut file = open_append(&path)?;
        write_flushed(&mut file, &path, &marker("opening", &path))?;
        debug!(path = %path.display(), "mirror file opened");

        self.file = Some(file);
        if let Some(slot) = &self.slot {
            *lock(slot) = Some(path.clone());
        }
        self.path = Some(path);
        Ok(())
    }

    /// Write the closing marker and unassign the file
    pub fn close(&mut self) -> Result<()> {
        let Some(path) = self.path.take() else {
            return Ok(());
        };
        let owed = self.slot.as_ref().map_or(true, |slot| lock(slot).take().is_some());
        if !owed {
            self.file = None;
            return Ok(());
        }

        let mut file = match self.file.take() {
            Some(file) => file,
            None => open_append(&path)?,
        };
        write_flushed(&mut file, &path, &marker("closing", &path))?;
        debug!(path = %path.display(), "mirror file closed");
        Ok(())
    }

    /// Append one line, opening the file if needed
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if self.file.is_none() {
            self.file = Some(open_append(path)?);
        }
        if let Some(file) = self.file.as_mut() {
            write_flushed(file, path, line)?;
        }
        Ok(())
    }

    /// Drop the file handle but keep the assignment
    pub fn release(&mut self) {
        if self.file.take().is_some() {
            debug!("mirror file handle released");
        }
    }
}

impl Drop for FileMirror {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close mirror file");
        }
    }
}

/// Append the closing marker for `path` without an assigned mirror
pub fn append_closing_marker(path: &Path) -> Result<()> {
    let mut file = open_append(path)?;
    write_flushed(&mut file, path, &marker("closing", path))
}

fn lock(slot: &MirrorSlot) -> MutexGuard<'_, Option<PathBuf>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
        DocShellError::output(format!("Could not open output file {}: {e}", path.display()))
    })
}

fn write_flushed(file: &mut File, path: &Path, line: &str) -> Result<()> {
    writeln!(file, "{line}").and_then(|()| file.flush()).map_err(|e| {
        DocShellError::output(format!("Could not write output file {}: {e}", path.display()))
    })
}

fn marker(action: &str, path: &Path) -> String {
    format!("# {action} '{}' {}", path.display(), Utc::now().format("%Y-%m-%d %H:%M:%S%.6f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn read(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn test_markers_wrap_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut mirror = FileMirror::new();
        mirror.assign(Some(path.clone())).unwrap();
        mirror.write_line("alpha").unwrap();
        mirror.write_line("beta").unwrap();
        mirror.close().unwrap();

        let lines = read(&path);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(&format!("# opening '{}' ", path.display())));
        assert_eq!(lines[1], "alpha");
        assert_eq!(lines[2], "beta");
        assert!(lines[3].starts_with(&format!("# closing '{}' ", path.display())));
        assert!(mirror.path().is_none());
    }

    #[test]
    fn test_reassigning_same_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut mirror = FileMirror::new();
        mirror.assign(Some(path.clone())).unwrap();
        mirror.write_line("first").unwrap();
        mirror.assign(Some(path.clone())).unwrap();
        mirror.write_line("second").unwrap();
        drop(mirror);

        let lines = read(&path);
        let kinds: Vec<&str> = lines.iter().map(|l| l.split(' ').nth(1).unwrap_or(l)).collect();
        assert_eq!(kinds, vec!["opening", "first", "closing", "opening", "second", "closing"]);
    }

    #[test]
    fn test_release_then_write_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut mirror = FileMirror::new();
        mirror.assign(Some(path.clone())).unwrap();
        mirror.release();
        assert!(!mirror.is_open());
        mirror.write_line("later").unwrap();
        assert!(mirror.is_open());
        mirror.release();
        mirror.close().unwrap();

        let lines = read(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "later");
        assert!(lines[2].starts_with("# closing"));
    }

    #[test]
    fn test_tracked_slot_follows_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let slot = MirrorSlot::default();

        let mut mirror = FileMirror::new();
        mirror.assign(Some(path.clone())).unwrap();
        mirror.track(slot.clone());
        assert_eq!(slot.lock().unwrap().as_deref(), Some(path.as_path()));

        mirror.close().unwrap();
        assert!(slot.lock().unwrap().is_none());
        assert_eq!(read(&path).len(), 2);
    }

    #[test]
    fn test_marker_taken_from_slot_is_not_repeated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let slot = MirrorSlot::default();

        let mut mirror = FileMirror::new();
        mirror.track(slot.clone());
        mirror.assign(Some(path.clone())).unwrap();
        let owed = slot.lock().unwrap().take().unwrap();
        append_closing_marker(&owed).unwrap();
        mirror.close().unwrap();

        let lines = read(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("# closing"));
    }

    #[test]
    fn test_unassigned_mirror_ignores_writes() {
        let mut mirror = FileMirror::new();
        mirror.write_line("nothing").unwrap();
        mirror.assign(Some(PathBuf::new())).unwrap();
        assert!(mirror.path().is_none());
        mirror.close().unwrap();
    }
}
