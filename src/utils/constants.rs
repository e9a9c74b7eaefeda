/// Appliance layout defaults and archive layout constants
///
/// Based on the provisioning layout of the HomeBrain appliance
/// (docker-compose project in /opt/homebrain, backup drive on /mnt/backup)

use std::time::Duration;

/// Default settings file location
pub const DEFAULT_SETTINGS_FILE: &str = "/etc/homebrain/backup.toml";

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV_VAR: &str = "HOMEBRAIN_BACKUP_CONFIG";

pub const DEFAULT_BACKUP_DIR: &str = "/mnt/backup";
pub const DEFAULT_PROJECT_DIR: &str = "/opt/homebrain";
pub const DEFAULT_ENV_FILE: &str = "/opt/homebrain/.env";
pub const DEFAULT_DATA_DIR: &str = "/home/admin/nextcloud";
pub const DEFAULT_CONFIG_DIR: &str = "/var/lib/docker/volumes/homebrain_nextcloud_config/_data";
pub const DEFAULT_APPS_DIR: &str = "/var/lib/docker/volumes/homebrain_nextcloud_apps/_data";
pub const DEFAULT_AUTOMATION_DIR: &str = "/opt/homebrain/homeassistant/config";
pub const DEFAULT_LOCK_FILE: &str = "/run/lock/homebrain-backup.lock";
pub const DEFAULT_CRON_FILE: &str = "/etc/cron.d/nextcloud-backup";
pub const DEFAULT_BINARY: &str = "/usr/local/sbin/homebrain-backup";
pub const DEFAULT_BACKUP_LOG: &str = "/var/log/raspi-nextcloud/backup.log";

/// Compose service names
pub const APP_SERVICE: &str = "nextcloud";
pub const DB_SERVICE: &str = "db";
pub const AUTOMATION_SERVICE: &str = "homeassistant";

/// Database defaults
pub const DEFAULT_DB_NAME: &str = "nextcloud";
pub const DEFAULT_DB_USER: &str = "nextcloud";

/// .env keys
pub const ENV_RETENTION: &str = "BACKUP_RETENTION";
pub const ENV_HOUR: &str = "BACKUP_HOUR";
pub const ENV_MINUTE: &str = "BACKUP_MINUTE";
pub const ENV_DAY_WEEK: &str = "BACKUP_DAY_WEEK";
pub const ENV_DAY_MONTH: &str = "BACKUP_DAY_MONTH";
pub const ENV_DATA_DIR: &str = "NEXTCLOUD_DATA_DIR";
pub const ENV_DB_USER: &str = "MYSQL_USER";
pub const ENV_DB_PASSWORD: &str = "MYSQL_PASSWORD";
pub const ENV_DB_ROOT_PASSWORD: &str = "MYSQL_ROOT_PASSWORD";

pub const DEFAULT_RETENTION: usize = 8;

pub const MIB: u64 = 1024 * 1024;

/// Space allowance for config + apps + automation capture
pub const DEFAULT_CONFIG_OVERHEAD: u64 = 50 * MIB;

/// Database size assumed when the engine cannot report its own size
pub const DEFAULT_DB_FALLBACK: u64 = 100 * MIB;

/// Staging tree and final archive coexist on the backup volume
pub const DEFAULT_SAFETY_FACTOR: u64 = 2;

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Archive file naming
pub const ARCHIVE_PREFIX: &str = "backup_";
pub const LEGACY_DATA_ONLY_PREFIX: &str = "nc_data_only_";
pub const DATA_ONLY_TAG: &str = "_data_only";
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";
pub const PARTIAL_SUFFIX: &str = ".partial";
pub const STAGING_PREFIX: &str = ".staging-";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Component locations inside the modern (prefixed) archive layout
pub const MODERN_DATA: &str = "nc_data";
pub const MODERN_DB_DIR: &str = "nc_db";
pub const MODERN_CONFIG: &str = "nc_config";
pub const MODERN_APPS: &str = "nc_apps";
pub const MODERN_AUTOMATION: &str = "ha_config";

/// Component locations inside the legacy (flat) archive layout
pub const LEGACY_DATA: &str = "data";
pub const LEGACY_DB_DIR: &str = "db";
pub const LEGACY_CONFIG: &str = "config";

/// Name of the database dump file written by capture
pub const DUMP_FILE: &str = "nextcloud.sql";

/// Nextcloud config artifact holding the database credentials
pub const APP_CONFIG_FILE: &str = "config.php";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_names_never_match_archive_prefix() {
        let partial = format!(".{}x{}{}", ARCHIVE_PREFIX, ARCHIVE_EXTENSION, PARTIAL_SUFFIX);
        assert!(!partial.starts_with(ARCHIVE_PREFIX));
        assert!(!partial.ends_with(ARCHIVE_EXTENSION));
    }

    #[test]
    fn test_space_defaults() {
        assert_eq!(DEFAULT_CONFIG_OVERHEAD, 52_428_800);
        assert_eq!(DEFAULT_DB_FALLBACK, 2 * DEFAULT_CONFIG_OVERHEAD);
        assert_eq!(DEFAULT_SAFETY_FACTOR, 2);
    }
}
