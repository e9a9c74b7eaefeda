/// Backup schedule
///
/// Retention and cron fields live in the environment store; the cron file
/// is regenerated from them on every change.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::core::config::{BackupSchedule, EnvStore};

const CRON_HEADER: &str = "# Generated by homebrain-backup, changes are overwritten";

/// Cron file content: header plus a single entry running `<binary> backup`
pub fn render_cron(schedule: &BackupSchedule, binary: &Path, log_file: &Path) -> String {
    format!(
        "{}\n{} {} {} * {} root {} backup >> {} 2>&1\n",
        CRON_HEADER,
        schedule.minute,
        schedule.hour,
        schedule.day_month,
        schedule.day_week,
        binary.display(),
        log_file.display()
    )
}

/// Persist `schedule` to the environment store and rewrite the cron file
pub fn apply(
    env: &mut EnvStore,
    schedule: &BackupSchedule,
    cron_file: &Path,
    binary: &Path,
    log_file: &Path,
) -> Result<()> {
    env.set_schedule(schedule)?;
    env.save()?;

    let content = render_cron(schedule, binary, log_file);
    if let Some(parent) = cron_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(cron_file, content)
        .with_context(|| format!("Failed to write cron file {}", cron_file.display()))?;

    info!(
        cron = %cron_file.display(),
        minute = %schedule.minute,
        hour = %schedule.hour,
        day_month = %schedule.day_month,
        day_week = %schedule.day_week,
        retention = schedule.retention,
        "backup schedule updated"
    );
    Ok(())
}
