// r2backup/src/utils/lock.rs
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::errors::{AppError, Result};

/// Mutual-exclusion guard for the whole backup run.
///
/// Overlapping scheduled invocations would race on the state file, with the
/// later save winning non-deterministically, so the entire run is treated as
/// one critical section. The lock file is removed on drop; a stale file left
/// by a crashed run has to be removed by the operator.
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                // Record the pid for operators inspecting a stale lock.
                let _ = writeln!(file, "{}", std::process::id());
                Ok(RunLock {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(AppError::Locked(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            eprintln!(
                "⚠️ Failed to remove lock file {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
