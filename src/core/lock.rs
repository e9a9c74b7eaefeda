/// Host-wide exclusivity lock
///
/// One backup-or-restore at a time. Backed by an advisory `flock` on a lock
/// file, so the kernel releases it when the holding process exits, crashed
/// or not. Acquisition never blocks.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::error::{EngineError, EngineResult};

/// Held for the lifetime of one orchestrator invocation; dropping it unlocks
#[derive(Debug)]
pub struct LockHandle {
    file: File,
    path: PathBuf,
}

impl LockHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        // The file itself stays in place: unlinking it would let a second
        // process lock a fresh inode while a third still waits on the old one.
        if let Err(e) = self.file.unlock() {
            debug!(lock = %self.path.display(), error = %e, "explicit unlock failed");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExclusivityLock {
    path: PathBuf,
}

impl ExclusivityLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Try to take the lock. Fails immediately with `Busy` if held elsewhere.
    pub fn acquire(&self) -> EngineResult<LockHandle> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(EngineError::Busy {
                lock_file: self.path.clone(),
            });
        }

        // Holder pid is informational only
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        debug!(lock = %self.path.display(), "exclusivity lock acquired");
        Ok(LockHandle {
            file,
            path: self.path.clone(),
        })
    }
}
