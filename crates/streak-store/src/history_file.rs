//! JSON file holding the active-day set

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use streak_util::LogicalDay;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{HistoryStore, StoreError, StoreResult};

/// Active-day set stored as a sorted JSON array of `YYYY-MM-DD` strings.
///
/// Writes go to a temporary file in the same directory which then replaces
/// the target, so a crash mid-write leaves the previous file intact.
pub struct JsonHistoryFile {
    path: PathBuf,
}

impl JsonHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryStore for JsonHistoryFile {
    fn load_days(&self) -> StoreResult<BTreeSet<LogicalDay>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "History file absent, starting empty");
            return Ok(BTreeSet::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let days: Vec<LogicalDay> = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), days = days.len(), "History loaded");
        Ok(days.into_iter().collect())
    }

    fn save_days(&self, days: &BTreeSet<LogicalDay>) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // BTreeSet iterates in order, so the array is already sorted
        let sorted: Vec<&LogicalDay> = days.iter().collect();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, &sorted)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %self.path.display(), days = days.len(), "History saved");
        Ok(())
    }
}
