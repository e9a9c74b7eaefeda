/// Engine context
///
/// Everything an orchestrator touches is reached through this value: the
/// settings (volume and live paths), the collaborators, and the interrupt
/// flag. Nothing is process-global, so tests run against isolated volumes.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::core::archive::{Archiver, TarGz};
use crate::core::config::EnvStore;
use crate::core::database::{Database, MariaDb};
use crate::core::docker::DockerManager;
use crate::core::error::{EngineError, EngineResult};
use crate::core::health::ReadinessGate;
use crate::core::interrupt::Interrupt;
use crate::core::lock::ExclusivityLock;
use crate::core::maintenance::MaintenanceController;
use crate::core::mirror::{FileTree, Rsync};
use crate::core::services::ServiceControl;
use crate::utils::Settings;

pub struct EngineContext {
    pub settings: Settings,
    pub services: Arc<dyn ServiceControl>,
    pub database: Arc<dyn Database>,
    pub files: Arc<dyn FileTree>,
    pub archiver: Arc<dyn Archiver>,
    pub interrupt: Interrupt,
}

impl EngineContext {
    pub fn new(
        settings: Settings,
        services: Arc<dyn ServiceControl>,
        database: Arc<dyn Database>,
        files: Arc<dyn FileTree>,
        archiver: Arc<dyn Archiver>,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            settings,
            services,
            database,
            files,
            archiver,
            interrupt,
        }
    }

    /// Wire the production collaborators: docker compose, MariaDB, rsync, tar.gz
    pub fn connect(settings: Settings, interrupt: Interrupt) -> Result<Self> {
        let docker = DockerManager::new(&settings.paths.project_dir, &settings.services.app)?;

        let root_password = EnvStore::load(&settings.paths.env_file)
            .ok()
            .and_then(|env| env.get(&settings.database.root_password_env_key).map(str::to_string))
            .with_context(|| {
                format!(
                    "{} not found in {}",
                    settings.database.root_password_env_key,
                    settings.paths.env_file.display()
                )
            })?;

        let database = MariaDb::new(
            docker.compose().clone(),
            &settings.services.database,
            &settings.database.name,
            &root_password,
        );

        Ok(Self::new(
            settings,
            Arc::new(docker),
            Arc::new(database),
            Arc::new(Rsync),
            Arc::new(TarGz),
            interrupt,
        ))
    }

    pub fn lock(&self) -> ExclusivityLock {
        ExclusivityLock::new(&self.settings.paths.lock_file)
    }

    pub fn maintenance(&self) -> MaintenanceController {
        MaintenanceController::new(self.services.clone())
    }

    pub fn health_timeout(&self) -> EngineResult<Duration> {
        self.settings
            .timeouts
            .health_timeout()
            .map_err(|e| EngineError::Config(format!("{:#}", e)))
    }

    pub fn gate(&self) -> EngineResult<ReadinessGate> {
        let poll = self
            .settings
            .timeouts
            .poll_interval()
            .map_err(|e| EngineError::Config(format!("{:#}", e)))?;
        Ok(ReadinessGate::new(self.services.clone(), poll))
    }

    /// Wait for a service with the configured timeout
    pub async fn wait_healthy(&self, service: &str) -> EngineResult<()> {
        let timeout = self.health_timeout()?;
        self.gate()?.wait_healthy(service, timeout).await
    }

    /// The deployment `.env`, or `None` (with a warning) when it cannot be read
    pub fn env_store(&self) -> Option<EnvStore> {
        match EnvStore::load(&self.settings.paths.env_file) {
            Ok(env) => Some(env),
            Err(e) => {
                warn!(error = %e, "environment store unavailable, using defaults");
                None
            }
        }
    }

    /// Live data tree: `NEXTCLOUD_DATA_DIR` from the environment wins over settings
    pub fn data_dir(&self, env: Option<&EnvStore>) -> PathBuf {
        env.and_then(|env| env.data_dir())
            .unwrap_or_else(|| self.settings.paths.data_dir.clone())
    }
}
