/// Capture modules
///
/// Each module copies one component into its slot of the staging tree.
/// Sources that do not exist are skipped, not failed.

use anyhow::anyhow;
use std::path::Path;
use tracing::{info, warn};

use crate::core::database::Database;
use crate::core::error::{EngineError, EngineResult};
use crate::core::layout::Component;
use crate::core::mirror::FileTree;
use crate::utils::format_bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured,
    Skipped,
}

/// Mirror the live data tree into staging, deleting extraneous files
pub async fn capture_data(files: &dyn FileTree, data_dir: &Path, staging: &Path) -> EngineResult<CaptureOutcome> {
    if !data_dir.is_dir() {
        warn!(path = %data_dir.display(), "data directory missing, skipping");
        return Ok(CaptureOutcome::Skipped);
    }

    let dest = Component::Data.staging_path(staging);
    files
        .mirror(data_dir, &dest, true)
        .await
        .map_err(|source| EngineError::CaptureFailed {
            component: Component::Data,
            source,
        })?;

    info!(component = %Component::Data, "captured");
    Ok(CaptureOutcome::Captured)
}

/// Logical dump of the schema. A dump of zero bytes fails the whole backup.
pub async fn capture_database(database: &dyn Database, staging: &Path) -> EngineResult<u64> {
    let failed = |source: anyhow::Error| EngineError::CaptureFailed {
        component: Component::Database,
        source,
    };

    match database.ping().await {
        Ok(true) => {}
        Ok(false) => return Err(failed(anyhow!("database is not reachable"))),
        Err(e) => return Err(failed(e.context("database liveness probe failed"))),
    }

    let dest = Component::Database.staging_path(staging);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| failed(e.into()))?;
    }

    let bytes = database.dump(&dest).await.map_err(failed)?;
    if bytes == 0 {
        return Err(EngineError::EmptyDump);
    }

    info!(component = %Component::Database, size = %format_bytes(bytes), "captured");
    Ok(bytes)
}

/// Copy a configuration tree. `best_effort` turns copy failures into warnings.
pub async fn capture_tree(
    files: &dyn FileTree,
    component: Component,
    source: &Path,
    staging: &Path,
    best_effort: bool,
    warnings: &mut Vec<String>,
) -> EngineResult<CaptureOutcome> {
    if !source.is_dir() {
        info!(%component, path = %source.display(), "source absent, skipping");
        return Ok(CaptureOutcome::Skipped);
    }

    let dest = component.staging_path(staging);
    match files.mirror(source, &dest, true).await {
        Ok(()) => {
            info!(%component, "captured");
            Ok(CaptureOutcome::Captured)
        }
        Err(e) if best_effort => {
            let message = format!("{} not captured: {:#}", component, e);
            warn!("{}", message);
            warnings.push(message);
            // A half-copied optional tree must not end up in the archive
            let _ = tokio::fs::remove_dir_all(&dest).await;
            Ok(CaptureOutcome::Skipped)
        }
        Err(source) => Err(EngineError::CaptureFailed { component, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::MockDatabase;
    use crate::core::mirror::MockFileTree;
    use crate::core::testing::{CopyTree, FakeDatabase};

    #[tokio::test]
    async fn test_zero_byte_dump_is_fatal() {
        let staging = tempfile::tempdir().unwrap();
        let database = FakeDatabase::new();
        database.set_dump(b"");

        let err = capture_database(&database, staging.path()).await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyDump));
    }

    #[tokio::test]
    async fn test_unreachable_database_is_capture_failure() {
        let staging = tempfile::tempdir().unwrap();
        let mut database = MockDatabase::new();
        database.expect_ping().returning(|| Ok(false));
        database.expect_dump().never();

        let err = capture_database(&database, staging.path()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::CaptureFailed { component: Component::Database, .. }
        ));
    }

    #[tokio::test]
    async fn test_dump_lands_in_modern_slot() {
        let staging = tempfile::tempdir().unwrap();
        let database = FakeDatabase::new();

        let bytes = capture_database(&database, staging.path()).await.unwrap();
        let dump = staging.path().join("nc_db/nextcloud.sql");
        assert_eq!(std::fs::metadata(dump).unwrap().len(), bytes);
    }

    #[tokio::test]
    async fn test_missing_sources_are_skipped() {
        let staging = tempfile::tempdir().unwrap();
        let mut warnings = Vec::new();
        let missing = staging.path().join("nope");

        assert_eq!(
            capture_data(&CopyTree, &missing, staging.path()).await.unwrap(),
            CaptureOutcome::Skipped
        );
        assert_eq!(
            capture_tree(&CopyTree, Component::Automation, &missing, staging.path(), true, &mut warnings)
                .await
                .unwrap(),
            CaptureOutcome::Skipped
        );
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_best_effort_copy_failure_is_warning() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("apps");
        std::fs::create_dir(&source).unwrap();
        let staging = root.path().join("staging");

        let mut files = MockFileTree::new();
        files
            .expect_mirror()
            .returning(|_, _, _| Err(anyhow!("permission denied")));

        let mut warnings = Vec::new();
        let outcome = capture_tree(&files, Component::Apps, &source, &staging, true, &mut warnings)
            .await
            .unwrap();
        assert_eq!(outcome, CaptureOutcome::Skipped);
        assert_eq!(warnings.len(), 1);

        let err = capture_tree(&files, Component::Config, &source, &staging, false, &mut warnings)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CaptureFailed { component: Component::Config, .. }));
    }
}
