/// Error taxonomy of the backup/restore engine
///
/// Every variant renders a distinct reason string and maps to a distinct
/// process exit code. Soft failures (`ReconciliationFailed`,
/// `PostRepairFailed`) are produced by the steps that detect them but the
/// orchestrators downgrade them to report warnings instead of aborting.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::health::ServiceHealthState;
use crate::core::layout::Component;
use crate::core::restore::RestoreState;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("another backup or restore is already running (lock {})", .lock_file.display())]
    Busy { lock_file: PathBuf },

    #[error("insufficient space on backup volume: need {required} bytes, {available} available")]
    InsufficientSpace { required: u64, available: u64 },

    #[error("capture of {component} failed: {source:#}")]
    CaptureFailed {
        component: Component,
        #[source]
        source: anyhow::Error,
    },

    #[error("database dump is empty, refusing to publish archive")]
    EmptyDump,

    #[error("packaging archive failed: {0:#}")]
    PackageFailed(#[source] anyhow::Error),

    #[error("archive {} failed integrity check: {source:#}", .archive.display())]
    IntegrityFailed {
        archive: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("archive {} contains no recognizable component", .archive.display())]
    StructureInvalid { archive: PathBuf },

    #[error("credential reconciliation failed: {0}")]
    ReconciliationFailed(String),

    #[error("service '{service}' not healthy after {}s (last state: {last_state})", .waited.as_secs())]
    ServiceTimeout {
        service: String,
        waited: Duration,
        last_state: ServiceHealthState,
    },

    #[error("post-restore repair failed: {0}")]
    PostRepairFailed(String),

    #[error("restore failed while {state}: {source:#}")]
    RestoreFailed {
        state: RestoreState,
        #[source]
        source: anyhow::Error,
    },

    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("operation interrupted by signal")]
    Interrupted,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Busy { .. } => 10,
            EngineError::InsufficientSpace { .. } => 11,
            EngineError::CaptureFailed { .. } => 12,
            EngineError::EmptyDump => 13,
            EngineError::PackageFailed(_) => 14,
            EngineError::IntegrityFailed { .. } => 15,
            EngineError::StructureInvalid { .. } => 16,
            EngineError::ReconciliationFailed(_) => 17,
            EngineError::ServiceTimeout { .. } => 18,
            EngineError::PostRepairFailed(_) => 19,
            EngineError::RestoreFailed { .. } => 20,
            EngineError::ArchiveNotFound(_) => 21,
            EngineError::Interrupted => 130,
            EngineError::Config(_) => 2,
            EngineError::Io(_) => 1,
        }
    }

    /// Soft failures are logged as warnings and never abort an operation
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            EngineError::ReconciliationFailed(_) | EngineError::PostRepairFailed(_)
        )
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
