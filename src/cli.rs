/// CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use homebrain_backup::core::Strategy;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "homebrain-backup")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Settings file (default: /etc/homebrain/backup.toml)
    #[arg(short, long, global = true, env = "HOMEBRAIN_BACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a backup archive on the backup volume
    Backup {
        /// What to capture
        #[arg(short, long, value_enum, default_value_t = Strategy::Full)]
        strategy: Strategy,

        /// Archives to keep (overrides BACKUP_RETENTION)
        #[arg(short, long)]
        retention: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore from an archive in the backup directory
    Restore {
        /// Archive file name, or "latest"
        archive: String,

        /// Do not ask for confirmation
        #[arg(short, long, visible_alias = "no-prompt")]
        yes: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List archives, newest first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show the newest archive
    Latest {
        #[arg(long)]
        json: bool,
    },

    /// Backup volume usage
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Backup schedule and retention
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// File-sync application maintenance mode
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommands,
    },

    /// Re-apply the database password from .env to the database
    Reconcile,
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Show the current schedule
    Show {
        #[arg(long)]
        json: bool,
    },

    /// Change the schedule and rewrite the cron file
    Set {
        /// Archives to keep
        #[arg(long)]
        retention: Option<usize>,

        /// Minute (0-59 or *)
        #[arg(long)]
        minute: Option<String>,

        /// Hour (0-23 or *)
        #[arg(long)]
        hour: Option<String>,

        /// Day of month (1-31 or *)
        #[arg(long)]
        day_month: Option<String>,

        /// Day of week (0-7 or *)
        #[arg(long)]
        day_week: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MaintenanceCommands {
    /// Enable maintenance mode
    On,
    /// Disable maintenance mode
    Off,
    /// Show maintenance mode state
    Status,
}
