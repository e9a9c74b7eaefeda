/// File-tree collaborator
///
/// One-way mirror of a directory tree, preserving ownership, permissions,
/// ACLs and extended attributes the applications depend on.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileTree: Send + Sync {
    /// Make `dst` a copy of the contents of `src`. With `delete_extraneous`,
    /// files under `dst` that do not exist under `src` are removed.
    async fn mirror(&self, src: &Path, dst: &Path, delete_extraneous: bool) -> Result<()>;
}

/// Trailing slash so rsync copies the directory contents, not the directory
fn contents_of(path: &Path) -> String {
    let mut s = path.display().to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

pub fn rsync_args(src: &Path, dst: &Path, delete_extraneous: bool) -> Vec<String> {
    let mut args = vec!["-aHAX".to_string(), "--numeric-ids".to_string()];
    if delete_extraneous {
        args.push("--delete".to_string());
    }
    args.push(contents_of(src));
    args.push(contents_of(dst));
    args
}

#[derive(Debug, Clone, Default)]
pub struct Rsync;

#[async_trait]
impl FileTree for Rsync {
    async fn mirror(&self, src: &Path, dst: &Path, delete_extraneous: bool) -> Result<()> {
        if !src.is_dir() {
            return Err(anyhow!("source {} is not a directory", src.display()));
        }

        tokio::fs::create_dir_all(dst)
            .await
            .with_context(|| format!("Failed to create {}", dst.display()))?;

        let args = rsync_args(src, dst, delete_extraneous);
        debug!(args = ?args, "rsync");

        let output = Command::new("rsync")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute rsync")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "rsync {} -> {} failed: {}",
                src.display(),
                dst.display(),
                stderr.trim()
            ));
        }

        Ok(())
    }
}
