/// Backup orchestrator
///
/// One run: lock, space preflight, database readiness, staging, maintenance
/// on, captures, maintenance off, package, retention. Cleanup runs
/// innermost-first on every exit path: maintenance is switched off before the
/// staging tree goes away, and the lock is released last.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use crate::core::archive;
use crate::core::capture::{capture_data, capture_database, capture_tree, CaptureOutcome};
use crate::core::catalog::ArchiveName;
pub use crate::core::catalog::Strategy;
use crate::core::context::EngineContext;
use crate::core::error::{EngineError, EngineResult};
use crate::core::layout::Component;
use crate::core::retention::{self, RetentionOutcome};
use crate::core::space::{SpaceEstimate, SpacePreflight};
use crate::core::staging::StagingArea;
use crate::core::storage;
use crate::utils::{format_bytes, DEFAULT_RETENTION, TIMESTAMP_FORMAT};

#[derive(Debug, Clone)]
pub struct BackupPlan {
    pub strategy: Strategy,
    pub timestamp: NaiveDateTime,
    /// Overrides `BACKUP_RETENTION` from the environment store
    pub retention: Option<usize>,
}

impl BackupPlan {
    pub fn now(strategy: Strategy) -> Self {
        Self {
            strategy,
            timestamp: Local::now().naive_local(),
            retention: None,
        }
    }

    pub fn with_retention(mut self, retention: Option<usize>) -> Self {
        self.retention = retention;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub archive: PathBuf,
    pub strategy: Strategy,
    pub size_bytes: u64,
    pub components: Vec<Component>,
    pub estimate: SpaceEstimate,
    pub retention: RetentionOutcome,
    pub warnings: Vec<String>,
    pub elapsed_secs: u64,
}

pub struct BackupOrchestrator<'a> {
    ctx: &'a EngineContext,
}

impl<'a> BackupOrchestrator<'a> {
    pub fn new(ctx: &'a EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self, plan: &BackupPlan) -> EngineResult<BackupReport> {
        let span = info_span!(
            "backup",
            strategy = %plan.strategy,
            timestamp = %plan.timestamp.format(TIMESTAMP_FORMAT)
        );
        self.execute(plan).instrument(span).await
    }

    async fn execute(&self, plan: &BackupPlan) -> EngineResult<BackupReport> {
        let started = Instant::now();
        let ctx = self.ctx;
        let backup_dir = ctx.settings.paths.backup_dir.as_path();

        let _lock = ctx.lock().acquire()?;
        info!("backup started");

        let env = ctx.env_store();
        let data_dir = ctx.data_dir(env.as_ref());
        let retention = plan
            .retention
            .or_else(|| env.as_ref().map(|e| e.retention()))
            .unwrap_or(DEFAULT_RETENTION);

        std::fs::create_dir_all(backup_dir)?;
        let estimate = SpacePreflight::new(ctx.settings.space.clone())
            .measure(plan.strategy, &data_dir, ctx.database.as_ref())
            .await;
        let available = storage::available_space(backup_dir)?;
        estimate.check(available)?;

        if plan.strategy == Strategy::Full {
            ctx.interrupt
                .guard(ctx.wait_healthy(&ctx.settings.services.database))
                .await?;
        }

        let name = ArchiveName::new(plan.timestamp, plan.strategy);
        let final_path = backup_dir.join(name.file_name());
        if final_path.exists() {
            return Err(EngineError::PackageFailed(anyhow::anyhow!(
                "{} already exists",
                final_path.display()
            )));
        }

        let staging = StagingArea::open(backup_dir)
            .map_err(|e| EngineError::PackageFailed(e.context("staging area")))?;
        let mut warnings = Vec::new();

        let maintenance = ctx.maintenance();
        let window = match plan.strategy {
            Strategy::Full => Some(maintenance.enter().await),
            Strategy::DataOnly => None,
        };

        let captured = ctx
            .interrupt
            .guard(self.capture_all(plan.strategy, &data_dir, staging.path(), &mut warnings))
            .await;

        if let Some(window) = window {
            if let Some(warning) = maintenance.exit(window).await {
                warnings.push(warning);
            }
        }

        // staging is dropped (and removed) on the error path
        let components = captured?;

        let partial = backup_dir.join(name.partial_name());
        let packaged = ctx
            .interrupt
            .guard(async {
                archive::publish(ctx.archiver.as_ref(), staging.path(), &partial, &final_path)
                    .await
                    .map_err(EngineError::PackageFailed)
            })
            .await;
        let size_bytes = match packaged {
            Ok(size) => size,
            Err(e) => {
                let _ = std::fs::remove_file(&partial);
                return Err(e);
            }
        };
        info!(archive = %final_path.display(), size = %format_bytes(size_bytes), "archive published");

        let retention = match retention::enforce(backup_dir, retention) {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("retention not enforced: {}", e);
                warn!("{}", message);
                warnings.push(message);
                RetentionOutcome::default()
            }
        };

        if let Err(e) = staging.close() {
            let message = format!("{:#}", e);
            warn!("{}", message);
            warnings.push(message);
        }

        let elapsed_secs = started.elapsed().as_secs();
        info!(elapsed_secs, warnings = warnings.len(), "backup complete");

        Ok(BackupReport {
            archive: final_path,
            strategy: plan.strategy,
            size_bytes,
            components,
            estimate,
            retention,
            warnings,
            elapsed_secs,
        })
    }

    async fn capture_all(
        &self,
        strategy: Strategy,
        data_dir: &Path,
        staging: &Path,
        warnings: &mut Vec<String>,
    ) -> EngineResult<Vec<Component>> {
        let ctx = self.ctx;
        let paths = &ctx.settings.paths;
        let files = ctx.files.as_ref();
        let mut captured = Vec::new();

        if capture_data(files, data_dir, staging).await? == CaptureOutcome::Captured {
            captured.push(Component::Data);
        }

        if strategy == Strategy::Full {
            capture_database(ctx.database.as_ref(), staging).await?;
            captured.push(Component::Database);

            if capture_tree(files, Component::Config, &paths.config_dir, staging, false, warnings).await?
                == CaptureOutcome::Captured
            {
                captured.push(Component::Config);
            }

            if capture_tree(files, Component::Apps, &paths.apps_dir, staging, true, warnings).await?
                == CaptureOutcome::Captured
            {
                captured.push(Component::Apps);
            }

            if self.automation_installed().await
                && capture_tree(files, Component::Automation, &paths.automation_dir, staging, true, warnings)
                    .await?
                    == CaptureOutcome::Captured
            {
                captured.push(Component::Automation);
            }
        }

        if captured.is_empty() {
            return Err(EngineError::CaptureFailed {
                component: Component::Data,
                source: anyhow::anyhow!("nothing to capture"),
            });
        }

        Ok(captured)
    }

    async fn automation_installed(&self) -> bool {
        let service = &self.ctx.settings.services.automation;
        match self.ctx.services.is_installed(service).await {
            Ok(installed) => installed,
            Err(e) => {
                warn!(service = %service, error = %e, "could not tell whether automation service is installed");
                self.ctx.settings.paths.automation_dir.is_dir()
            }
        }
    }
}
