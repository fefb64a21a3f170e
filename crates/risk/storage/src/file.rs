//! Snapshot provider reading a JSON document from disk.
//!
//! The file is re-read on every load so an external sync job can rewrite it
//! between runs.

use crate::traits::SnapshotProvider;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use risk_types::{ScopeFilter, Snapshot};
use std::path::{Path, PathBuf};

/// JSON-file snapshot provider.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotProvider {
    path: PathBuf,
}

impl JsonFileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotProvider for JsonFileSnapshotProvider {
    async fn load_snapshot(&self, scope: &ScopeFilter) -> StorageResult<Snapshot> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            StorageError::Unavailable(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Serialization(format!("{}: {e}", self.path.display())))?;
        tracing::debug!(
            path = %self.path.display(),
            milestones = snapshot.milestones.len(),
            epics = snapshot.epic_stats.len(),
            "Loaded snapshot file"
        );
        Ok(snapshot.normalized(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn loads_and_normalizes_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "milestones": [
                    {{"id": "a", "title": "Alpha", "progress_percent": 40, "status": "in_progress"}},
                    {{"id": "b", "title": "Beta", "progress_percent": 100, "status": "completed"}}
                ],
                "epic_stats": [
                    {{"milestone_id": "a", "epic_key": "EP-1", "total_issues": 3,
                      "done_issues": 1, "blocked_issues": 0, "in_progress_issues": 2}}
                ]
            }}"#
        )
        .unwrap();

        let provider = JsonFileSnapshotProvider::new(file.path());
        let snapshot = provider.load_snapshot(&ScopeFilter::all()).await.unwrap();
        assert_eq!(snapshot.milestones.len(), 1);
        assert_eq!(snapshot.milestones[0].title, "Alpha");
        assert_eq!(snapshot.epic_stats.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let provider = JsonFileSnapshotProvider::new("/nonexistent/snapshot.json");
        let result = provider.load_snapshot(&ScopeFilter::all()).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn malformed_file_is_a_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let provider = JsonFileSnapshotProvider::new(file.path());
        let result = provider.load_snapshot(&ScopeFilter::all()).await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
