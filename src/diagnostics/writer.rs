//! Append-only JSONL session log.

use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::warn;

use super::{SessionLog, SessionReport};
use crate::{AppError, Result};

/// Appends one JSON object per finalized session to a single file.
pub struct JsonlSessionLog {
    path: PathBuf,
    writer: Mutex<BufWriter<fs::File>>,
}

impl JsonlSessionLog {
    /// Open (or create) `path` for appending.
    ///
    /// Creates missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the directory or file cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!(
                    "failed to create session log directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                AppError::Config(format!("failed to open session log {}: {e}", path.display()))
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionLog for JsonlSessionLog {
    fn append(&self, report: &SessionReport) -> Result<()> {
        let line = serde_json::to_string(report)
            .map_err(|e| AppError::Io(format!("failed to serialize session report: {e}")))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| AppError::Io("session log mutex poisoned".into()))?;

        if let Err(e) = writeln!(writer, "{line}") {
            warn!("failed to write session log entry: {e}");
            return Err(AppError::Io(format!("session log write failed: {e}")));
        }
        writer
            .flush()
            .map_err(|e| AppError::Io(format!("session log flush failed: {e}")))
    }
}
