use crate::error::{Result, WorkflowError};
use crate::state::{ApprovalPayload, MapProgress, WorkflowState};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bump when the snapshot layout changes incompatibly.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// File name of the persisted snapshot inside a run directory.
pub const SNAPSHOT_FILE: &str = "run.json";

/// Everything needed to reconstruct a run after a process restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub schema_version: u32,

    pub run_id: String,

    /// The uploaded source document
    pub source_path: PathBuf,

    /// SHA-256 of the source bytes at run creation
    pub document_fingerprint: Option<String>,

    /// Markdown produced by conversion (or OCR), addressed by path so the
    /// snapshot never carries document text
    pub markdown_path: Option<PathBuf>,

    pub state: WorkflowState,

    pub progress: MapProgress,

    /// Last accepted approval payload
    pub approval: Option<ApprovalPayload>,
}

impl RunSnapshot {
    pub fn new(run_id: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            run_id: run_id.into(),
            source_path: source_path.into(),
            document_fingerprint: None,
            markdown_path: None,
            state: WorkflowState::default(),
            progress: MapProgress::default(),
            approval: None,
        }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(SNAPSHOT_FILE)
    }

    pub async fn load(dir: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(Self::path_in(dir)).await?;
        let snapshot: RunSnapshot = serde_json::from_str(&raw)?;

        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(WorkflowError::SchemaVersion {
                found: snapshot.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }

        Ok(snapshot)
    }

    /// Persist atomically: write a sibling temp file, then rename over the
    /// snapshot. A crash mid-write leaves the previous snapshot intact.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;

        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let data = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, Self::path_in(dir)).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunStatus;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let mut snapshot = RunSnapshot::new("run-1", "/tmp/doc.pdf");
        snapshot.state.status = RunStatus::WaitingForHuman;
        snapshot.progress.next_batch = 3;
        snapshot.save(dir.path()).await.unwrap();

        let loaded = RunSnapshot::load(dir.path()).await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        RunSnapshot::new("run-1", "/tmp/doc.pdf")
            .save(dir.path())
            .await
            .unwrap();

        assert!(RunSnapshot::path_in(dir.path()).exists());
        assert!(!dir.path().join(format!("{SNAPSHOT_FILE}.tmp")).exists());
    }

    #[tokio::test]
    async fn test_schema_version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let mut snapshot = RunSnapshot::new("run-1", "/tmp/doc.pdf");
        snapshot.schema_version = SNAPSHOT_SCHEMA_VERSION + 1;
        let data = serde_json::to_string(&snapshot).unwrap();
        tokio::fs::write(RunSnapshot::path_in(dir.path()), data)
            .await
            .unwrap();

        let err = RunSnapshot::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SchemaVersion { .. }));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunSnapshot::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Io(_)));
    }
}
