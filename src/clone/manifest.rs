//! clone::manifest
//!
//! Run manifest: the sealed [`BatchResult`] as pretty JSON on disk.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::BatchResult;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write manifest '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read manifest '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Write `batch` to `path`, creating parent directories.
pub async fn write_manifest(batch: &BatchResult, path: &Path) -> Result<(), ManifestError> {
    let json = serde_json::to_string_pretty(batch)?;
    let write_err = |source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, json + "\n").await.map_err(write_err)?;
    tracing::debug!(path = %path.display(), "wrote manifest");
    Ok(())
}

/// Read a manifest written by [`write_manifest`].
pub async fn read_manifest(path: &Path) -> Result<BatchResult, ManifestError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CloneOutcome, CloneStatus};
    use std::time::Duration;

    #[tokio::test]
    async fn written_manifest_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/clone-manifest.json");

        let mut batch = BatchResult::start();
        batch.record(CloneOutcome {
            project: "apps/x".into(),
            status: CloneStatus::Failed,
            attempts: 3,
            error: Some("Connection timeout for apps/x".into()),
            elapsed: Duration::from_millis(1500),
            path: dir.path().join("apps/x"),
            head: None,
        });
        batch.record(CloneOutcome {
            project: "apps/y".into(),
            status: CloneStatus::Success,
            attempts: 1,
            error: None,
            elapsed: Duration::from_millis(800),
            path: dir.path().join("apps/y"),
            head: Some("4b825dc642cb6eb9a060e54bf8d69288fbee4904".into()),
        });
        batch.seal();

        write_manifest(&batch, &path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"status\": \"FAILED\""));
        assert_eq!(text.matches("\"head\"").count(), 1);

        let parsed = read_manifest(&path).await.unwrap();
        assert_eq!(parsed.run_id, batch.run_id);
        assert_eq!(parsed.failed_count(), 1);
        assert_eq!(parsed.outcome("apps/x").unwrap().elapsed, Duration::from_millis(1500));
        assert_eq!(
            parsed.outcome("apps/y").unwrap().head.as_deref(),
            Some("4b825dc642cb6eb9a060e54bf8d69288fbee4904")
        );
    }
}
