/// Restore orchestrator
///
/// Verify, extract into staging, detect components, then restore each
/// present component onto its live path. Restore is not transactional: a
/// failure after live paths were touched leaves them as they are, and a
/// re-run converges (delete-propagating mirrors, drop-and-recreate schema).

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::core::catalog::{ArchiveName, Strategy};
use crate::core::context::EngineContext;
use crate::core::credentials::CredentialReconciler;
use crate::core::error::{EngineError, EngineResult};
use crate::core::layout::{self, Component, ComponentPresence};
use crate::core::maintenance::MaintenanceWindow;
use crate::core::services::RepairStep;
use crate::core::staging::StagingArea;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreState {
    Idle,
    Verifying,
    Extracting,
    Detecting,
    RestoringData,
    RestoringConfig,
    ReconcilingCredentials,
    RestoringDatabase,
    RestartingServices,
    PostRepair,
    Done,
    Failed,
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RestoreState::Idle => "idle",
            RestoreState::Verifying => "verifying archive",
            RestoreState::Extracting => "extracting archive",
            RestoreState::Detecting => "detecting components",
            RestoreState::RestoringData => "restoring data",
            RestoreState::RestoringConfig => "restoring config",
            RestoreState::ReconcilingCredentials => "reconciling credentials",
            RestoreState::RestoringDatabase => "restoring database",
            RestoreState::RestartingServices => "restarting services",
            RestoreState::PostRepair => "running post-restore repair",
            RestoreState::Done => "done",
            RestoreState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub archive: PathBuf,
    pub strategy: Strategy,
    pub presence: ComponentPresence,
    /// States passed through, in order
    pub states: Vec<RestoreState>,
    pub credentials_reconciled: bool,
    pub warnings: Vec<String>,
    pub elapsed_secs: u64,
}

/// Tracks the current state and wraps collaborator errors with it
struct Progress {
    state: RestoreState,
    states: Vec<RestoreState>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: RestoreState::Idle,
            states: vec![RestoreState::Idle],
        }
    }

    fn enter(&mut self, state: RestoreState) {
        info!(%state, "restore step");
        self.state = state;
        self.states.push(state);
    }

    fn fail(&self, source: anyhow::Error) -> EngineError {
        EngineError::RestoreFailed {
            state: self.state,
            source,
        }
    }
}

pub struct RestoreOrchestrator<'a> {
    ctx: &'a EngineContext,
}

impl<'a> RestoreOrchestrator<'a> {
    pub fn new(ctx: &'a EngineContext) -> Self {
        Self { ctx }
    }

    /// Restore from `archive`, a file inside the backup directory
    pub async fn run(&self, archive: &Path) -> EngineResult<RestoreReport> {
        let span = info_span!("restore", archive = %archive.display());
        async {
            let mut progress = Progress::new();
            let result = self.execute(archive, &mut progress).await;
            if let Err(e) = &result {
                error!(state = %progress.state, error = %e, "restore failed");
                progress.enter(RestoreState::Failed);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, archive: &Path, progress: &mut Progress) -> EngineResult<RestoreReport> {
        let started = Instant::now();
        let ctx = self.ctx;
        let interrupt = &ctx.interrupt;
        let mut warnings = Vec::new();

        let _lock = ctx.lock().acquire()?;

        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| EngineError::ArchiveNotFound(archive.display().to_string()))?;
        let name = ArchiveName::parse(file_name);
        let strategy = name.as_ref().map(|name| name.strategy).unwrap_or(Strategy::Full);
        if !archive.is_file() {
            return Err(EngineError::ArchiveNotFound(archive.display().to_string()));
        }

        progress.enter(RestoreState::Verifying);
        interrupt
            .guard(async {
                ctx.archiver
                    .verify(archive)
                    .await
                    .map(|_| ())
                    .map_err(|source| EngineError::IntegrityFailed {
                        archive: archive.to_path_buf(),
                        source,
                    })
            })
            .await?;

        progress.enter(RestoreState::Extracting);
        let staging = StagingArea::open(&ctx.settings.paths.backup_dir).map_err(|e| progress.fail(e))?;
        interrupt
            .guard(async {
                ctx.archiver
                    .extract(archive, staging.path())
                    .await
                    .map_err(|source| EngineError::IntegrityFailed {
                        archive: archive.to_path_buf(),
                        source,
                    })
            })
            .await?;

        progress.enter(RestoreState::Detecting);
        let presence = layout::detect(staging.path(), name.as_ref());
        if presence.is_empty() {
            return Err(EngineError::StructureInvalid {
                archive: archive.to_path_buf(),
            });
        }
        info!(components = ?presence.components(), "components detected");

        let mut reconciled = false;
        if presence.components() == vec![Component::Data] {
            interrupt
                .guard(self.restore_data_only(&presence, progress, &mut warnings))
                .await?;
        } else {
            reconciled = interrupt
                .guard(self.restore_full(&presence, progress, &mut warnings))
                .await?;
        }

        progress.enter(RestoreState::Done);
        if let Err(e) = staging.close() {
            warnings.push(format!("{:#}", e));
        }

        let elapsed_secs = started.elapsed().as_secs();
        info!(elapsed_secs, warnings = warnings.len(), "restore complete");

        Ok(RestoreReport {
            archive: archive.to_path_buf(),
            strategy,
            presence,
            states: progress.states.clone(),
            credentials_reconciled: reconciled,
            warnings,
            elapsed_secs,
        })
    }

    async fn restore_data_only(
        &self,
        presence: &ComponentPresence,
        progress: &mut Progress,
        warnings: &mut Vec<String>,
    ) -> EngineResult<()> {
        let ctx = self.ctx;
        let app = ctx.settings.services.app.as_str();

        progress.enter(RestoreState::RestoringData);
        ctx.services.stop(app).await.map_err(|e| progress.fail(e))?;
        self.restore_data(presence, progress).await?;

        progress.enter(RestoreState::RestartingServices);
        ctx.services.start(app).await.map_err(|e| progress.fail(e))?;
        ctx.wait_healthy(app).await?;

        progress.enter(RestoreState::PostRepair);
        self.repair(&[RepairStep::RescanFiles], warnings).await?;
        Ok(())
    }

    /// Returns whether the database credential was reconciled
    async fn restore_full(
        &self,
        presence: &ComponentPresence,
        progress: &mut Progress,
        warnings: &mut Vec<String>,
    ) -> EngineResult<bool> {
        let ctx = self.ctx;
        let services = &ctx.settings.services;
        let paths = &ctx.settings.paths;
        let app = services.app.as_str();
        let automation = services.automation.as_str();
        let restore_automation = presence.has(Component::Automation) && self.automation_installed().await;

        progress.enter(RestoreState::RestoringData);
        ctx.services.stop(app).await.map_err(|e| progress.fail(e))?;
        if restore_automation {
            ctx.services.stop(automation).await.map_err(|e| progress.fail(e))?;
        }
        self.restore_data(presence, progress).await?;

        progress.enter(RestoreState::RestoringConfig);
        for (component, target) in [
            (Component::Config, &paths.config_dir),
            (Component::Apps, &paths.apps_dir),
            (Component::Automation, &paths.automation_dir),
        ] {
            if component == Component::Automation && !restore_automation {
                continue;
            }
            if let Some(located) = presence.get(component) {
                ctx.files
                    .mirror(&located.path, target, true)
                    .await
                    .map_err(|e| progress.fail(e.context(format!("restoring {}", component))))?;
                info!(%component, target = %target.display(), "restored");
            }
        }

        let needs_database = presence.has(Component::Config) || presence.has(Component::Database);
        if needs_database {
            ctx.services
                .start(&services.database)
                .await
                .map_err(|e| progress.fail(e))?;
            ctx.wait_healthy(&services.database).await?;
        }

        let mut reconciled = false;
        if presence.has(Component::Config) {
            progress.enter(RestoreState::ReconcilingCredentials);
            reconciled = self.reconcile(warnings).await?;
        }

        if let Some(dump) = presence.get(Component::Database) {
            progress.enter(RestoreState::RestoringDatabase);
            ctx.database
                .restore(&dump.path)
                .await
                .map_err(|e| progress.fail(e))?;
            info!(dump = %dump.path.display(), "database restored");
        }

        progress.enter(RestoreState::RestartingServices);
        ctx.services.start(app).await.map_err(|e| progress.fail(e))?;
        ctx.wait_healthy(app).await?;
        if restore_automation {
            ctx.services.start(automation).await.map_err(|e| progress.fail(e))?;
            if let Err(e) = ctx.wait_healthy(automation).await {
                let message = format!("automation service not ready: {}", e);
                warn!("{}", message);
                warnings.push(message);
            }
        }

        progress.enter(RestoreState::PostRepair);
        // A snapshot taken in maintenance mode carries the flag in its config
        if let Some(warning) = ctx.maintenance().exit(MaintenanceWindow { entered: true }).await {
            record_soft(EngineError::PostRepairFailed(warning), warnings)?;
        }
        self.repair(
            &[RepairStep::Repair, RepairStep::DataFingerprint, RepairStep::RescanFiles],
            warnings,
        )
        .await?;

        Ok(reconciled)
    }

    async fn restore_data(&self, presence: &ComponentPresence, progress: &mut Progress) -> EngineResult<()> {
        let Some(located) = presence.get(Component::Data) else {
            info!("archive has no data tree");
            return Ok(());
        };

        let env = self.ctx.env_store();
        let data_dir = self.ctx.data_dir(env.as_ref());
        self.ctx
            .files
            .mirror(&located.path, &data_dir, true)
            .await
            .map_err(|e| progress.fail(e.context(format!("restoring data into {}", data_dir.display()))))?;
        info!(layout = ?located.layout, target = %data_dir.display(), "data restored");
        Ok(())
    }

    async fn reconcile(&self, warnings: &mut Vec<String>) -> EngineResult<bool> {
        let ctx = self.ctx;
        let Some(mut env) = ctx.env_store() else {
            warnings.push("environment store unavailable, database credential not reconciled".to_string());
            return Ok(false);
        };

        let reconciler = CredentialReconciler::new(ctx.database.clone(), ctx.settings.database.clone());
        match reconciler.reconcile(&ctx.settings.paths.config_dir, &mut env).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => {
                warnings.push("database credential could not be read from restored config".to_string());
                Ok(false)
            }
            Err(EngineError::ReconciliationFailed(reason)) => {
                let reason = format!("{} (retry with `homebrain-backup reconcile`)", reason);
                record_soft(EngineError::ReconciliationFailed(reason), warnings)?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Each step is attempted; failures become warnings
    async fn repair(&self, steps: &[RepairStep], warnings: &mut Vec<String>) -> EngineResult<()> {
        for step in steps {
            match self.ctx.services.repair(*step).await {
                Ok(()) => info!(%step, "repair step done"),
                Err(e) => record_soft(EngineError::PostRepairFailed(format!("{}: {:#}", step, e)), warnings)?,
            }
        }
        Ok(())
    }

    async fn automation_installed(&self) -> bool {
        let service = &self.ctx.settings.services.automation;
        match self.ctx.services.is_installed(service).await {
            Ok(installed) => installed,
            Err(e) => {
                warn!(service = %service, error = %e, "automation service state unknown, not restoring it");
                false
            }
        }
    }
}

/// Soft failures become report warnings, anything else aborts
fn record_soft(error: EngineError, warnings: &mut Vec<String>) -> EngineResult<()> {
    if !error.is_soft() {
        return Err(error);
    }
    warn!("{}", error);
    warnings.push(error.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::{Archiver, TarGz};
    use crate::core::backup::{BackupOrchestrator, BackupPlan};
    use crate::core::config::EnvStore;
    use crate::core::credentials::{extract_from_config_dir, CredentialSet};
    use crate::core::interrupt::Interrupt;
    use crate::core::testing::{Appliance, InterruptingTree, CONFIG_PHP};
    use std::sync::Arc;
    use std::fs;

    async fn full_backup(appliance: &Appliance) -> PathBuf {
        let ctx = appliance.context();
        BackupOrchestrator::new(&ctx)
            .run(&BackupPlan::now(Strategy::Full))
            .await
            .unwrap()
            .archive
    }

    /// Package an arbitrary tree under `name` in the backup directory
    async fn archive_tree(appliance: &Appliance, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let tree = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let file = tree.path().join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, content).unwrap();
        }
        let archive = appliance.path("backup").join(name);
        TarGz.compress(tree.path(), &archive).await.unwrap();
        archive
    }

    #[tokio::test]
    async fn test_full_restore_reconciles_credentials() {
        let appliance = Appliance::new();
        let archive = full_backup(&appliance).await;

        // Live state drifts after the snapshot
        fs::write(appliance.path("data/admin/files/notes.md"), "changed").unwrap();
        fs::write(appliance.path("data/admin/files/new.md"), "new").unwrap();
        fs::write(appliance.path("config/config.php"), "<?php // broken").unwrap();

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert!(report.credentials_reconciled, "warnings: {:?}", report.warnings);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
        assert_eq!(fs::read_to_string(appliance.path("data/admin/files/notes.md")).unwrap(), "hello");
        assert!(!appliance.path("data/admin/files/new.md").exists());
        assert_eq!(fs::read_to_string(appliance.path("config/config.php")).unwrap(), CONFIG_PHP);
        assert!(appliance.database.restored().is_some());

        // config == env == live engine
        let from_config = extract_from_config_dir(&appliance.path("config")).unwrap();
        let env = EnvStore::load(appliance.path(".env")).unwrap();
        assert_eq!(env.get("MYSQL_PASSWORD"), Some(from_config.password()));
        assert!(appliance.database.accepts(&from_config));
        assert!(!appliance.database.accepts(&CredentialSet::new("oc_admin", "deployed")));

        let reconcile_at = report.states.iter().position(|s| *s == RestoreState::ReconcilingCredentials);
        let database_at = report.states.iter().position(|s| *s == RestoreState::RestoringDatabase);
        let config_at = report.states.iter().position(|s| *s == RestoreState::RestoringConfig);
        assert!(config_at < reconcile_at && reconcile_at < database_at);
        assert_eq!(report.states.last(), Some(&RestoreState::Done));

        assert!(!appliance.services.in_maintenance());
        for step in ["occ maintenance:repair", "occ maintenance:data-fingerprint", "occ files:scan --all"] {
            assert_eq!(appliance.services.count(step), 1, "{}", step);
        }
        assert!(appliance.leftovers().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_layout_restore() {
        let appliance = Appliance::new();
        let archive = archive_tree(
            &appliance,
            "backup_2023-01-10_03-00-00.tar.gz",
            &[
                ("data/admin/files/old.md", "from 2023"),
                ("db/nextcloud.sql", "-- legacy dump"),
                ("config/config.php", CONFIG_PHP),
            ],
        )
        .await;

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert_eq!(
            report.presence.components(),
            vec![Component::Data, Component::Database, Component::Config]
        );
        assert_eq!(
            fs::read_to_string(appliance.path("data/admin/files/old.md")).unwrap(),
            "from 2023"
        );
        assert_eq!(appliance.database.restored().unwrap(), b"-- legacy dump");
        assert!(report.credentials_reconciled);
    }

    #[tokio::test]
    async fn test_archive_without_automation_leaves_it_untouched() {
        let appliance = Appliance::new();
        let archive = archive_tree(
            &appliance,
            "backup_2024-02-01_03-00-00.tar.gz",
            &[
                ("nc_data/admin/files/a.md", "a"),
                ("nc_db/nextcloud.sql", "-- dump"),
                ("nc_config/config.php", CONFIG_PHP),
            ],
        )
        .await;

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert!(!report.presence.has(Component::Automation));
        assert!(!appliance.services.touched("homeassistant"));
        assert_eq!(
            fs::read_to_string(appliance.path("automation/configuration.yaml")).unwrap(),
            "homeassistant:\n"
        );
    }

    #[tokio::test]
    async fn test_automation_restored_when_present() {
        let appliance = Appliance::new();
        let archive = full_backup(&appliance).await;
        fs::write(appliance.path("automation/configuration.yaml"), "edited").unwrap();

        let ctx = appliance.context();
        RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert_eq!(appliance.services.count("stop homeassistant"), 1);
        assert_eq!(appliance.services.count("start homeassistant"), 1);
        assert_eq!(
            fs::read_to_string(appliance.path("automation/configuration.yaml")).unwrap(),
            "homeassistant:\n"
        );
    }

    #[tokio::test]
    async fn test_corrupt_archive_touches_nothing() {
        let appliance = Appliance::new();
        let archive = appliance.path("backup/backup_2024-02-01_03-00-00.tar.gz");
        fs::write(&archive, b"\x1f\x8b garbage").unwrap();

        let ctx = appliance.context();
        let err = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap_err();

        assert!(matches!(err, EngineError::IntegrityFailed { .. }));
        assert!(appliance.services.calls().is_empty());
        assert_eq!(fs::read_to_string(appliance.path("data/admin/files/notes.md")).unwrap(), "hello");
        assert!(appliance.leftovers().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_structure() {
        let appliance = Appliance::new();
        let archive = archive_tree(
            &appliance,
            "backup_2024-02-01_03-00-00.tar.gz",
            &[("random/file.txt", "x")],
        )
        .await;

        let ctx = appliance.context();
        let err = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap_err();
        assert!(matches!(err, EngineError::StructureInvalid { .. }));
        assert!(appliance.services.calls().is_empty());
        assert!(appliance.leftovers().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_data_only_archive() {
        let appliance = Appliance::new();
        let archive = archive_tree(
            &appliance,
            "nc_data_only_2023-06-01_12-00-00.tar.gz",
            &[("admin/files/photo.jpg", "jpeg")],
        )
        .await;

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert_eq!(report.strategy, Strategy::DataOnly);
        assert_eq!(fs::read_to_string(appliance.path("data/admin/files/photo.jpg")).unwrap(), "jpeg");
        assert!(!appliance.path("data/admin/files/notes.md").exists());
        assert!(appliance.database.restored().is_none());
        assert_eq!(appliance.services.count("occ files:scan --all"), 1);
        assert_eq!(appliance.services.count("occ maintenance:repair"), 0);
        assert!(!report.states.contains(&RestoreState::ReconcilingCredentials));
    }

    #[tokio::test]
    async fn test_repair_failures_are_soft() {
        let appliance = Appliance::new();
        let archive = full_backup(&appliance).await;
        appliance.services.fail_repair(RepairStep::Repair);

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("post-restore repair failed"));
        assert_eq!(appliance.services.count("occ files:scan --all"), 1);
    }

    #[tokio::test]
    async fn test_reconciliation_failure_is_soft() {
        let appliance = Appliance::new();
        let archive = full_backup(&appliance).await;
        appliance.database.fail_password_changes(true);

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert!(!report.credentials_reconciled);
        assert!(report.warnings.iter().any(|w| w.contains("reconcile")));
        assert!(appliance.database.restored().is_some());
    }

    #[tokio::test]
    async fn test_database_timeout_fails_restore() {
        let appliance = Appliance::new();
        let archive = full_backup(&appliance).await;
        appliance
            .services
            .set_health("db", crate::core::health::ServiceHealthState::Unhealthy);

        let ctx = appliance.context();
        let err = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap_err();
        assert!(matches!(err, EngineError::ServiceTimeout { .. }));
        assert!(appliance.leftovers().is_empty());
    }

    #[tokio::test]
    async fn test_historical_data_only_with_marker_named_user_folder() {
        let appliance = Appliance::new();
        let archive = archive_tree(
            &appliance,
            "nc_data_only_2023-06-01_12-00-00.tar.gz",
            &[
                ("admin/files/photo.jpg", "jpeg"),
                ("data/files/x.txt", "x"),
                ("config/files/y.txt", "y"),
                (".ocdata", ""),
            ],
        )
        .await;

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();

        assert_eq!(report.presence.components(), vec![Component::Data]);
        assert_eq!(report.presence.get(Component::Data).unwrap().layout, layout::Layout::Bare);
        assert_eq!(fs::read_to_string(appliance.path("data/admin/files/photo.jpg")).unwrap(), "jpeg");
        assert_eq!(fs::read_to_string(appliance.path("data/data/files/x.txt")).unwrap(), "x");
        assert_eq!(fs::read_to_string(appliance.path("data/config/files/y.txt")).unwrap(), "y");
        assert!(appliance.path("data/.ocdata").exists());
        assert!(!appliance.path("data/files/x.txt").exists());
        assert_eq!(fs::read_to_string(appliance.path("config/config.php")).unwrap(), CONFIG_PHP);
    }

    #[tokio::test]
    async fn test_quoted_password_survives_reconciliation() {
        let appliance = Appliance::new();
        fs::write(
            appliance.path("config/config.php"),
            "<?php\n$CONFIG = array (\n  'dbuser' => 'oc_admin',\n  'dbpassword' => '\"pw\"',\n);\n",
        )
        .unwrap();
        let archive = full_backup(&appliance).await;

        let ctx = appliance.context();
        let report = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap();
        assert!(report.credentials_reconciled, "warnings: {:?}", report.warnings);

        let from_config = extract_from_config_dir(&appliance.path("config")).unwrap();
        let env = EnvStore::load(appliance.path(".env")).unwrap();
        assert_eq!(from_config.password(), "\"pw\"");
        assert_eq!(env.get("MYSQL_PASSWORD"), Some(from_config.password()));
        assert!(appliance.database.accepts(&from_config));
    }

    #[tokio::test]
    async fn test_interrupt_during_data_restore_cleans_up() {
        let appliance = Appliance::new();
        let archive = full_backup(&appliance).await;

        let (trigger, interrupt) = Interrupt::manual();
        let mut ctx = appliance.context_with(interrupt);
        ctx.files = Arc::new(InterruptingTree { trigger });

        let err = RestoreOrchestrator::new(&ctx).run(&archive).await.unwrap_err();

        assert!(matches!(err, EngineError::Interrupted));
        assert_eq!(appliance.services.count("stop nextcloud"), 1);
        assert!(appliance.database.restored().is_none());
        assert!(appliance.leftovers().is_empty(), "leftovers: {:?}", appliance.leftovers());
        assert_eq!(appliance.archives().len(), 1);
        assert!(ctx.lock().acquire().is_ok());
    }

    #[test]
    fn test_record_soft() {
        let mut warnings = Vec::new();
        record_soft(EngineError::PostRepairFailed("occ files:scan --all".into()), &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);

        let err = record_soft(EngineError::EmptyDump, &mut warnings).unwrap_err();
        assert!(matches!(err, EngineError::EmptyDump));
        assert_eq!(warnings.len(), 1);
    }
}
