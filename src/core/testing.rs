/// In-memory collaborators for orchestrator tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

use crate::core::archive::TarGz;
use crate::core::context::EngineContext;
use crate::core::credentials::CredentialSet;
use crate::core::database::Database;
use crate::core::health::ServiceHealthState;
use crate::core::interrupt::{Interrupt, InterruptTrigger};
use crate::core::mirror::FileTree;
use crate::core::services::{MaintenanceStatus, RepairStep, ServiceControl};
use crate::utils::Settings;

#[derive(Default)]
struct ServiceState {
    health: HashMap<String, ServiceHealthState>,
    installed: HashSet<String>,
    maintenance: bool,
    fail_enter: bool,
    fail_exit: bool,
    failing_repairs: HashSet<String>,
    calls: Vec<String>,
}

/// Service control with scripted health and a call log
#[derive(Default)]
pub struct FakeServices {
    state: Mutex<ServiceState>,
}

impl FakeServices {
    /// `nextcloud`, `db` and `homeassistant` installed and healthy
    pub fn healthy() -> Self {
        let fake = Self::default();
        for service in ["nextcloud", "db", "homeassistant"] {
            fake.install(service, ServiceHealthState::Healthy);
        }
        fake
    }

    pub fn install(&self, service: &str, health: ServiceHealthState) {
        let mut state = self.state.lock().unwrap();
        state.installed.insert(service.to_string());
        state.health.insert(service.to_string(), health);
    }

    pub fn uninstall(&self, service: &str) {
        let mut state = self.state.lock().unwrap();
        state.installed.remove(service);
        state.health.remove(service);
    }

    pub fn set_health(&self, service: &str, health: ServiceHealthState) {
        self.state.lock().unwrap().health.insert(service.to_string(), health);
    }

    pub fn fail_enter_maintenance(&self, fail: bool) {
        self.state.lock().unwrap().fail_enter = fail;
    }

    pub fn fail_exit_maintenance(&self, fail: bool) {
        self.state.lock().unwrap().fail_exit = fail;
    }

    pub fn fail_repair(&self, step: RepairStep) {
        self.state.lock().unwrap().failing_repairs.insert(step.to_string());
    }

    pub fn in_maintenance(&self) -> bool {
        self.state.lock().unwrap().maintenance
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    /// Any call mentioning `service`
    pub fn touched(&self, service: &str) -> bool {
        self.calls().iter().any(|c| c.ends_with(&format!(" {}", service)))
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ServiceControl for FakeServices {
    async fn status(&self, service: &str) -> Result<ServiceHealthState> {
        self.record(format!("status {}", service));
        Ok(self
            .state
            .lock()
            .unwrap()
            .health
            .get(service)
            .copied()
            .unwrap_or(ServiceHealthState::Unknown))
    }

    async fn is_installed(&self, service: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().installed.contains(service))
    }

    async fn start(&self, service: &str) -> Result<()> {
        self.record(format!("start {}", service));
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<()> {
        self.record(format!("stop {}", service));
        Ok(())
    }

    async fn enter_maintenance(&self) -> Result<()> {
        self.record("maintenance on".to_string());
        let mut state = self.state.lock().unwrap();
        if state.fail_enter {
            return Err(anyhow!("occ maintenance:mode --on failed"));
        }
        state.maintenance = true;
        Ok(())
    }

    async fn exit_maintenance(&self) -> Result<()> {
        self.record("maintenance off".to_string());
        let mut state = self.state.lock().unwrap();
        if state.fail_exit {
            return Err(anyhow!("occ maintenance:mode --off failed"));
        }
        state.maintenance = false;
        Ok(())
    }

    async fn maintenance_status(&self) -> Result<MaintenanceStatus> {
        Ok(if self.in_maintenance() {
            MaintenanceStatus::Enabled
        } else {
            MaintenanceStatus::Disabled
        })
    }

    async fn repair(&self, step: RepairStep) -> Result<()> {
        self.record(step.to_string());
        if self.state.lock().unwrap().failing_repairs.contains(&step.to_string()) {
            return Err(anyhow!("{} exited with status 1", step));
        }
        Ok(())
    }
}

struct DatabaseState {
    reachable: bool,
    size: Option<u64>,
    dump: Vec<u8>,
    restored: Option<Vec<u8>>,
    users: HashMap<String, String>,
    fail_password: bool,
    password_changes: usize,
}

/// Database engine holding one schema as opaque dump bytes plus a user table
pub struct FakeDatabase {
    state: Mutex<DatabaseState>,
}

impl Default for FakeDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DatabaseState {
                reachable: true,
                size: Some(1024),
                dump: b"-- MariaDB dump\nCREATE TABLE oc_users (uid VARCHAR(64));\n".to_vec(),
                restored: None,
                users: HashMap::new(),
                fail_password: false,
                password_changes: 0,
            }),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    pub fn set_size(&self, size: Option<u64>) {
        self.state.lock().unwrap().size = size;
    }

    pub fn set_dump(&self, dump: &[u8]) {
        self.state.lock().unwrap().dump = dump.to_vec();
    }

    pub fn restored(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().restored.clone()
    }

    pub fn set_user_password(&self, user: &str, password: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.to_string(), password.to_string());
    }

    pub fn fail_password_changes(&self, fail: bool) {
        self.state.lock().unwrap().fail_password = fail;
    }

    pub fn password_changes(&self) -> usize {
        self.state.lock().unwrap().password_changes
    }

    pub fn accepts(&self, credentials: &CredentialSet) -> bool {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&credentials.user)
            .is_some_and(|p| p == credentials.password())
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn ping(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().reachable)
    }

    async fn size_estimate(&self) -> Result<u64> {
        self.state
            .lock()
            .unwrap()
            .size
            .ok_or_else(|| anyhow!("information_schema not readable"))
    }

    async fn dump(&self, dest: &Path) -> Result<u64> {
        let dump = self.state.lock().unwrap().dump.clone();
        std::fs::write(dest, &dump)?;
        Ok(dump.len() as u64)
    }

    async fn restore(&self, source: &Path) -> Result<()> {
        let content = std::fs::read(source)?;
        self.state.lock().unwrap().restored = Some(content);
        Ok(())
    }

    async fn set_password(&self, credentials: &CredentialSet) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_password {
            return Err(anyhow!("ERROR 1396 (HY000): Operation ALTER USER failed"));
        }
        state.password_changes += 1;
        state
            .users
            .insert(credentials.user.clone(), credentials.password().to_string());
        Ok(())
    }

    async fn authenticate(&self, credentials: &CredentialSet) -> Result<bool> {
        Ok(self.accepts(credentials))
    }
}

/// Directory mirror implemented with plain file copies
#[derive(Default)]
pub struct CopyTree;

#[async_trait]
impl FileTree for CopyTree {
    async fn mirror(&self, src: &Path, dst: &Path, delete_extraneous: bool) -> Result<()> {
        if !src.is_dir() {
            return Err(anyhow!("source {} is not a directory", src.display()));
        }
        std::fs::create_dir_all(dst)?;

        if delete_extraneous {
            for entry in std::fs::read_dir(dst)? {
                let path = entry?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(&path)?;
                } else {
                    std::fs::remove_file(&path)?;
                }
            }
        }

        for entry in WalkDir::new(src).min_depth(1) {
            let entry = entry?;
            let relative = entry.path().strip_prefix(src)?;
            let target = dst.join(relative);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else {
                std::fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }
}

/// Fires the interrupt on the first mirror call, then hangs
pub struct InterruptingTree {
    pub trigger: InterruptTrigger,
}

#[async_trait]
impl FileTree for InterruptingTree {
    async fn mirror(&self, _src: &Path, _dst: &Path, _delete_extraneous: bool) -> Result<()> {
        self.trigger.fire();
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(())
    }
}

/// Live trees and volume of one fake appliance
pub struct Appliance {
    pub root: tempfile::TempDir,
    pub services: Arc<FakeServices>,
    pub database: Arc<FakeDatabase>,
}

impl Appliance {
    /// Data, config (with credentials), apps and automation trees plus a .env
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let base = root.path();

        for (path, content) in [
            ("data/admin/files/notes.md", "hello"),
            ("config/config.php", CONFIG_PHP),
            ("apps/calendar/appinfo/info.xml", "<info/>"),
            ("automation/configuration.yaml", "homeassistant:\n"),
        ] {
            let file = base.join(path);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, content).unwrap();
        }
        std::fs::create_dir_all(base.join("backup")).unwrap();
        std::fs::write(
            base.join(".env"),
            "MYSQL_USER=oc_admin\nMYSQL_PASSWORD=deployed\nMYSQL_ROOT_PASSWORD=root\nBACKUP_RETENTION=8\n",
        )
        .unwrap();

        let database = Arc::new(FakeDatabase::new());
        database.set_user_password("oc_admin", "deployed");

        Self {
            root,
            services: Arc::new(FakeServices::healthy()),
            database,
        }
    }

    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        self.root.path().join(relative)
    }

    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        let paths = &mut settings.paths;
        paths.backup_dir = self.path("backup");
        paths.project_dir = self.root.path().to_path_buf();
        paths.env_file = self.path(".env");
        paths.data_dir = self.path("data");
        paths.config_dir = self.path("config");
        paths.apps_dir = self.path("apps");
        paths.automation_dir = self.path("automation");
        paths.lock_file = self.path("backup.lock");
        paths.cron_file = self.path("cron");
        settings.timeouts.health_timeout = "200ms".to_string();
        settings.timeouts.poll_interval = "10ms".to_string();
        settings
    }

    pub fn context(&self) -> EngineContext {
        self.context_with(Interrupt::never())
    }

    pub fn context_with(&self, interrupt: Interrupt) -> EngineContext {
        EngineContext::new(
            self.settings(),
            self.services.clone(),
            self.database.clone(),
            Arc::new(CopyTree),
            Arc::new(TarGz),
            interrupt,
        )
    }

    pub fn archives(&self) -> Vec<String> {
        crate::core::catalog::list(&self.path("backup"))
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect()
    }

    /// Entries of the backup dir that are not published archives
    pub fn leftovers(&self) -> Vec<String> {
        std::fs::read_dir(self.path("backup"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| crate::core::catalog::ArchiveName::parse(name).is_none())
            .collect()
    }
}

pub const CONFIG_PHP: &str = "<?php\n$CONFIG = array (\n  'dbtype' => 'mysql',\n  'dbuser' => 'oc_admin',\n  'dbpassword' => 'snapshot-password',\n);\n";
