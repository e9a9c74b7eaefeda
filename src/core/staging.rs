/// Staging area manager
///
/// One fresh hidden directory per operation, on the backup volume itself so
/// packaging never copies across devices. Removal happens on `close()` or, on
/// any other exit path, when the area is dropped. Directories left by a
/// crashed process are not swept.

use anyhow::{Context, Result};
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::utils::STAGING_PREFIX;

#[derive(Debug)]
pub struct StagingArea {
    dir: Option<TempDir>,
}

impl StagingArea {
    /// Create a uniquely named directory under `backup_dir`
    pub fn open(backup_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(backup_dir)
            .with_context(|| format!("Failed to create backup directory {}", backup_dir.display()))?;

        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(backup_dir)
            .with_context(|| format!("Failed to create staging area in {}", backup_dir.display()))?;

        debug!(staging = %dir.path().display(), "staging area opened");
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        // Only `close` takes the directory, and it consumes self
        self.dir
            .as_ref()
            .map(|d| d.path())
            .unwrap_or_else(|| Path::new(""))
    }

    /// Remove the staging tree, reporting failures
    pub fn close(mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            dir.close()
                .with_context(|| format!("Failed to remove staging area {}", path.display()))?;
            debug!(staging = %path.display(), "staging area removed");
        }
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(staging = %path.display(), error = %e, "failed to remove staging area");
            }
        }
    }
}
