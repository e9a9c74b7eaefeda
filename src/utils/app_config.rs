/// Engine settings
/// Stored in /etc/homebrain/backup.toml (or ~/.config/homebrain-backup/backup.toml)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::constants::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub services: ServiceNames,
    pub database: DatabaseSettings,
    pub timeouts: TimeoutSettings,
    pub space: SpaceSettings,
}

/// Host locations of the backup volume and of every captured component
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub backup_dir: PathBuf,
    pub project_dir: PathBuf,
    pub env_file: PathBuf,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub apps_dir: PathBuf,
    pub automation_dir: PathBuf,
    pub lock_file: PathBuf,
    pub cron_file: PathBuf,
    pub binary: PathBuf,
    pub backup_log: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            project_dir: PathBuf::from(DEFAULT_PROJECT_DIR),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            apps_dir: PathBuf::from(DEFAULT_APPS_DIR),
            automation_dir: PathBuf::from(DEFAULT_AUTOMATION_DIR),
            lock_file: PathBuf::from(DEFAULT_LOCK_FILE),
            cron_file: PathBuf::from(DEFAULT_CRON_FILE),
            binary: PathBuf::from(DEFAULT_BINARY),
            backup_log: PathBuf::from(DEFAULT_BACKUP_LOG),
        }
    }
}

/// Compose service names of the managed applications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceNames {
    pub app: String,
    pub database: String,
    pub automation: String,
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            app: APP_SERVICE.to_string(),
            database: DB_SERVICE.to_string(),
            automation: AUTOMATION_SERVICE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub name: String,
    pub default_user: String,
    pub user_env_key: String,
    pub password_env_key: String,
    pub root_password_env_key: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_DB_NAME.to_string(),
            default_user: DEFAULT_DB_USER.to_string(),
            user_env_key: ENV_DB_USER.to_string(),
            password_env_key: ENV_DB_PASSWORD.to_string(),
            root_password_env_key: ENV_DB_ROOT_PASSWORD.to_string(),
        }
    }
}

/// Readiness timeouts in humantime notation ("5m", "3s")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub health_timeout: String,
    pub poll_interval: String,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            health_timeout: humantime::format_duration(DEFAULT_HEALTH_TIMEOUT).to_string(),
            poll_interval: humantime::format_duration(DEFAULT_POLL_INTERVAL).to_string(),
        }
    }
}

impl TimeoutSettings {
    pub fn health_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.health_timeout)
            .with_context(|| format!("Invalid health_timeout '{}'", self.health_timeout))
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        humantime::parse_duration(&self.poll_interval)
            .with_context(|| format!("Invalid poll_interval '{}'", self.poll_interval))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceSettings {
    pub config_overhead_bytes: u64,
    pub db_fallback_bytes: u64,
    pub safety_factor: u64,
}

impl Default for SpaceSettings {
    fn default() -> Self {
        Self {
            config_overhead_bytes: DEFAULT_CONFIG_OVERHEAD,
            db_fallback_bytes: DEFAULT_DB_FALLBACK,
            safety_factor: DEFAULT_SAFETY_FACTOR,
        }
    }
}

impl Settings {
    /// Resolve the settings file: explicit path, env var, system file, user file
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(SETTINGS_ENV_VAR) {
            return Some(PathBuf::from(path));
        }

        let system = PathBuf::from(DEFAULT_SETTINGS_FILE);
        if system.exists() {
            return Some(system);
        }

        dirs::config_dir()
            .map(|dir| dir.join("homebrain-backup").join("backup.toml"))
            .filter(|path| path.exists())
    }

    /// Load settings, falling back to built-in defaults when no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match Self::locate(explicit) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;

        let settings: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, contents).context("Failed to write settings file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.timeouts.health_timeout()?;
        let poll = self.timeouts.poll_interval()?;
        if poll.is_zero() {
            return Err(anyhow!("poll_interval must be greater than zero"));
        }
        if self.space.safety_factor == 0 {
            return Err(anyhow!("space.safety_factor must be at least 1"));
        }
        if self.services.app.is_empty() || self.services.database.is_empty() {
            return Err(anyhow!("service names must not be empty"));
        }
        Ok(())
    }
}
