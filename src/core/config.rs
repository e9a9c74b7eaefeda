/// Environment store for the appliance .env file
///
/// Handles reading, writing, and validating the deployment environment that
/// docker compose feeds to the containers (database credentials, backup
/// schedule, data directory).

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::{
    is_valid_cron_field, DEFAULT_RETENTION, ENV_DATA_DIR, ENV_DAY_MONTH, ENV_DAY_WEEK, ENV_HOUR,
    ENV_MINUTE, ENV_RETENTION,
};

pub struct EnvStore {
    env_file: PathBuf,
    config: HashMap<String, String>,
}

impl EnvStore {
    /// Load configuration from .env file
    pub fn load<P: AsRef<Path>>(env_file: P) -> Result<Self> {
        let env_file = env_file.as_ref().to_path_buf();

        if !env_file.exists() {
            return Err(anyhow!(".env file not found at {}", env_file.display()));
        }

        let content = fs::read_to_string(&env_file)
            .context("Failed to read .env file")?;

        Ok(Self {
            env_file,
            config: Self::parse(&content),
        })
    }

    fn parse(content: &str) -> HashMap<String, String> {
        let mut config = HashMap::new();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.starts_with('#') || line.is_empty() {
                continue;
            }

            // Parse key=value
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().trim_start_matches("export ").trim().to_string();
                config.insert(key, unquote(value.trim()));
            }
        }

        config
    }

    pub fn path(&self) -> &Path {
        &self.env_file
    }

    /// Save configuration to .env file.
    ///
    /// Existing lines keep their order and comments, new keys are appended.
    /// The file is replaced atomically and left readable by root only.
    pub fn save(&self) -> Result<()> {
        let mut lines = Vec::new();
        let mut written = std::collections::HashSet::new();

        // Preserve order by reading original file
        let original = fs::read_to_string(&self.env_file).unwrap_or_default();
        for line in original.lines() {
            let line_trimmed = line.trim();

            if line_trimmed.starts_with('#') || line_trimmed.is_empty() {
                lines.push(line.to_string());
            } else if let Some((key, _)) = line_trimmed.split_once('=') {
                let key = key.trim().trim_start_matches("export ").trim();
                if let Some(value) = self.config.get(key) {
                    lines.push(format_entry(key, value));
                    written.insert(key.to_string());
                }
            } else {
                lines.push(line.to_string());
            }
        }

        let mut appended: Vec<(&String, &String)> = self
            .config
            .iter()
            .filter(|(key, _)| !written.contains(*key))
            .collect();
        appended.sort();
        for (key, value) in appended {
            lines.push(format_entry(key, value));
        }

        let dir = self
            .env_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary .env file")?;
        writeln!(tmp, "{}", lines.join("\n")).context("Failed to write .env file")?;
        tmp.as_file().sync_all().context("Failed to flush .env file")?;
        set_owner_only(tmp.path())?;
        tmp.persist(&self.env_file)
            .map_err(|e| anyhow!("Failed to replace .env file: {}", e.error))?;

        Ok(())
    }

    /// Get a configuration value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Set a configuration value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
    }

    /// Number of archives to keep
    pub fn retention(&self) -> usize {
        self.get(ENV_RETENTION)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETENTION)
    }

    /// Data directory override of the deployment, if any
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.get(ENV_DATA_DIR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// Backup schedule (defaults: daily at 03:00)
    pub fn schedule(&self) -> BackupSchedule {
        BackupSchedule {
            retention: self.retention(),
            minute: self.get(ENV_MINUTE).unwrap_or("0").to_string(),
            hour: self.get(ENV_HOUR).unwrap_or("3").to_string(),
            day_month: self.get(ENV_DAY_MONTH).unwrap_or("*").to_string(),
            day_week: self.get(ENV_DAY_WEEK).unwrap_or("*").to_string(),
        }
    }

    pub fn set_schedule(&mut self, schedule: &BackupSchedule) -> Result<()> {
        let errors = schedule.validate();
        if !errors.is_empty() {
            return Err(anyhow!(errors.join("; ")));
        }

        self.set(ENV_RETENTION, schedule.retention.to_string());
        self.set(ENV_MINUTE, schedule.minute.clone());
        self.set(ENV_HOUR, schedule.hour.clone());
        self.set(ENV_DAY_MONTH, schedule.day_month.clone());
        self.set(ENV_DAY_WEEK, schedule.day_week.clone());
        Ok(())
    }
}

/// Values docker compose would interpolate, truncate or trim unless quoted
fn needs_quotes(value: &str) -> bool {
    value
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || "_-./:@,+*%=".contains(c)))
}

/// `KEY=value`, single-quoted with `\'` escapes when the value needs it
fn format_entry(key: &str, value: &str) -> String {
    if needs_quotes(value) {
        format!("{}='{}'", key, value.replace('\'', "\\'"))
    } else {
        format!("{}={}", key, value)
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'' {
        value[1..value.len() - 1].replace("\\'", "'")
    } else if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        value[1..value.len() - 1].replace("\\\"", "\"")
    } else {
        value.to_string()
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .context("Failed to restrict .env permissions")
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BackupSchedule {
    pub retention: usize,
    pub minute: String,
    pub hour: String,
    pub day_month: String,
    pub day_week: String,
}

impl BackupSchedule {
    /// Validate configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !is_valid_cron_field(&self.minute, 0, 59) {
            errors.push(format!("Invalid minute: {}", self.minute));
        }
        if !is_valid_cron_field(&self.hour, 0, 23) {
            errors.push(format!("Invalid hour: {}", self.hour));
        }
        if !is_valid_cron_field(&self.day_month, 1, 31) {
            errors.push(format!("Invalid day of month: {}", self.day_month));
        }
        if !is_valid_cron_field(&self.day_week, 0, 7) {
            errors.push(format!("Invalid day of week: {}", self.day_week));
        }

        errors
    }
}
