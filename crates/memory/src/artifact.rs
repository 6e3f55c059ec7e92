//! The per-task summary file: `<workspace>/<task_id>/summary.md`.
//!
//! Plain text, wholly overwritten on every compaction. No history is kept.

use std::path::{Path, PathBuf};

use thinkloop_core::error::MemoryError;
use thinkloop_core::message::TaskId;
use tracing::debug;

pub const SUMMARY_FILE: &str = "summary.md";

#[derive(Debug, Clone)]
pub struct SummaryArtifact {
    path: PathBuf,
}

impl SummaryArtifact {
    pub fn new(workspace: &Path, task_id: &TaskId) -> Self {
        Self {
            path: workspace.join(task_id.as_str()).join(SUMMARY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored summary; a missing or empty file means none.
    pub fn load(&self) -> Result<Option<String>, MemoryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoryError::Storage(format!(
                "Failed to read summary {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Overwrite the stored summary.
    pub fn save(&self, summary: &str) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create task directory: {e}"))
            })?;
        }
        std::fs::write(&self.path, summary).map_err(|e| {
            MemoryError::Storage(format!("Failed to write summary {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), bytes = summary.len(), "Summary persisted");
        Ok(())
    }

    pub fn remove(&self) -> Result<(), MemoryError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoryError::Storage(format!(
                "Failed to remove summary {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_scoped_by_task() {
        let artifact = SummaryArtifact::new(Path::new("/ws"), &TaskId::from("t1"));
        assert_eq!(artifact.path(), Path::new("/ws/t1/summary.md"));
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = SummaryArtifact::new(dir.path(), &TaskId::from("nope"));
        assert!(artifact.load().unwrap().is_none());
        assert!(artifact.remove().is_ok());
    }

    #[test]
    fn save_overwrites_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = SummaryArtifact::new(dir.path(), &TaskId::from("t"));

        artifact.save("first version, rather long").unwrap();
        artifact.save("second").unwrap();
        let once = std::fs::read(artifact.path()).unwrap();
        artifact.save("second").unwrap();
        let twice = std::fs::read(artifact.path()).unwrap();

        assert_eq!(once, b"second");
        assert_eq!(once, twice);
        assert_eq!(artifact.load().unwrap().as_deref(), Some("second"));
    }
}
