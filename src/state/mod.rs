// r2backup/src/state/mod.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::errors::{AppError, Result};

/// The single persisted record of the last *successful* upload.
///
/// Never written for a skipped or failed run. Unknown keys written by a newer
/// version are kept in `extra` and survive a load/save cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupState {
    pub last_hash: String,
    pub last_backup_time: DateTime<Utc>,
    pub last_artifact_name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BackupState {
    pub fn new(last_hash: String, last_backup_time: DateTime<Utc>, last_artifact_name: String) -> Self {
        BackupState {
            last_hash,
            last_backup_time,
            last_artifact_name,
            extra: serde_json::Map::new(),
        }
    }
}

/// Persists the backup state as a single pretty-printed JSON document at a
/// fixed path.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: &Path) -> Self {
        StateStore {
            path: path.to_path_buf(),
        }
    }

    /// Loads the previous state. A missing file is `Ok(None)`; an unreadable
    /// or unparseable file is `CorruptState`, which the caller downgrades to
    /// "no prior backup" with a warning.
    pub fn load(&self) -> Result<Option<BackupState>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::CorruptState(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => Err(AppError::CorruptState(format!(
                "failed to parse {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Atomically replaces the persisted record: write to a temp file in the
    /// same directory, then rename over the target. An interrupted save
    /// leaves either the old record or the new one, never a mix.
    pub fn save(&self, state: &BackupState) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| AppError::Io(e.error))?;
        Ok(())
    }
}
