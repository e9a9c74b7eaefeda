mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, MaintenanceCommands, ScheduleCommands};
use homebrain_backup::core::catalog::{self, ArchiveEntry};
use homebrain_backup::core::credentials::CredentialReconciler;
use homebrain_backup::core::interrupt::Interrupt;
use homebrain_backup::core::services::MaintenanceStatus;
use homebrain_backup::core::{schedule, storage};
use homebrain_backup::core::{
    BackupOrchestrator, BackupPlan, BackupReport, EngineContext, EngineError, EnvStore,
    RestoreOrchestrator, RestoreReport, Strategy,
};
use homebrain_backup::utils::{confirm, format_bytes, format_duration, is_dir_writable, Settings};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(2);
    }

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            e.downcast_ref::<EngineError>()
                .map(EngineError::exit_code)
                .unwrap_or(1)
        }
    };

    std::process::exit(code);
}

/// Human-readable output to stderr, plus plain text to `log_file` when given
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).map_err(|e| EngineError::Config(format!("{:#}", e)))?;

    match cli.command {
        Commands::Backup { strategy, retention, json } => {
            handle_backup(settings, strategy, retention, json).await?;
        }
        Commands::Restore { archive, yes, json } => {
            handle_restore(settings, &archive, yes, json).await?;
        }
        Commands::List { json } => {
            handle_list(&settings, json)?;
        }
        Commands::Latest { json } => {
            handle_latest(&settings, json)?;
        }
        Commands::Stats { json } => {
            handle_stats(&settings, json)?;
        }
        Commands::Schedule { command } => {
            handle_schedule(&settings, command)?;
        }
        Commands::Maintenance { command } => {
            handle_maintenance(settings, command).await?;
        }
        Commands::Reconcile => {
            handle_reconcile(settings).await?;
        }
    }

    Ok(())
}

async fn handle_backup(settings: Settings, strategy: Strategy, retention: Option<usize>, json: bool) -> Result<()> {
    let ctx = EngineContext::connect(settings, Interrupt::from_signals())?;
    let plan = BackupPlan::now(strategy).with_retention(retention);

    let report = BackupOrchestrator::new(&ctx).run(&plan).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_backup_report(&report);
    }
    Ok(())
}

fn print_backup_report(report: &BackupReport) {
    println!("{} Backup complete ({})", "✓".green(), report.strategy);
    println!("  Archive:    {}", report.archive.display());
    println!("  Size:       {}", format_bytes(report.size_bytes));
    println!(
        "  Components: {}",
        report.components.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
    );
    println!("  Duration:   {}", format_duration(report.elapsed_secs));
    println!(
        "  Retention:  kept {}, deleted {}",
        report.retention.kept,
        report.retention.deleted.len()
    );
    for path in &report.retention.deleted {
        println!("    - {}", path.display());
    }
    for warning in &report.warnings {
        println!("{} {}", "⚠".yellow(), warning);
    }
}

async fn handle_restore(settings: Settings, reference: &str, yes: bool, json: bool) -> Result<()> {
    let archive = catalog::resolve(&settings.paths.backup_dir, reference)?;

    if !yes {
        if !std::io::stdin().is_terminal() {
            return Err(EngineError::Config(
                "restore needs confirmation; pass --yes when running non-interactively".to_string(),
            )
            .into());
        }
        println!("{} Restoring overwrites live data, configuration and the database.", "⚠".yellow());
        if !confirm(&format!("Restore from {}?", archive.display()))? {
            println!("Restore cancelled");
            return Ok(());
        }
    }

    let ctx = EngineContext::connect(settings, Interrupt::from_signals())?;
    let report = RestoreOrchestrator::new(&ctx).run(&archive).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_restore_report(&report);
    }
    Ok(())
}

fn print_restore_report(report: &RestoreReport) {
    println!("{} Restore complete ({})", "✓".green(), report.strategy);
    println!("  Archive:     {}", report.archive.display());
    println!(
        "  Components:  {}",
        report.presence.components().iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
    );
    println!(
        "  Credentials: {}",
        if report.credentials_reconciled { "reconciled" } else { "unchanged" }
    );
    println!("  Duration:    {}", format_duration(report.elapsed_secs));
    for warning in &report.warnings {
        println!("{} {}", "⚠".yellow(), warning);
    }
}

fn print_archive_table(archives: &[ArchiveEntry]) {
    println!("{:<48} {:<10} {:<20} {:>10}", "Archive", "Strategy", "Created", "Size");
    println!("{}", "-".repeat(91));
    for archive in archives {
        println!(
            "{:<48} {:<10} {:<20} {:>10}",
            archive.name,
            archive.strategy.to_string(),
            archive.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            format_bytes(archive.size_bytes)
        );
    }
}

fn handle_list(settings: &Settings, json: bool) -> Result<()> {
    let dir = &settings.paths.backup_dir;
    let archives = catalog::list(dir).with_context(|| format!("Failed to list {}", dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&archives)?);
        return Ok(());
    }

    if archives.is_empty() {
        println!("No archives in {}", dir.display());
        return Ok(());
    }

    println!("Archives in {}\n", dir.display());
    print_archive_table(&archives);
    let total: u64 = archives.iter().map(|a| a.size_bytes).sum();
    println!("\n{} archive(s), {}", archives.len(), format_bytes(total));
    Ok(())
}

fn handle_latest(settings: &Settings, json: bool) -> Result<()> {
    let dir = &settings.paths.backup_dir;
    let latest = catalog::latest(dir).with_context(|| format!("Failed to list {}", dir.display()))?;

    match latest {
        Some(archive) if json => println!("{}", serde_json::to_string_pretty(&archive)?),
        Some(archive) => println!("{}", archive.path.display()),
        None => return Err(EngineError::ArchiveNotFound(format!("no archives in {}", dir.display())).into()),
    }
    Ok(())
}

fn handle_stats(settings: &Settings, json: bool) -> Result<()> {
    let dir = &settings.paths.backup_dir;
    let stats = storage::volume_stats(dir)?;
    let archives = catalog::list(dir).unwrap_or_default();

    if json {
        let value = serde_json::json!({
            "backup_dir": dir,
            "volume": stats,
            "writable": is_dir_writable(dir),
            "archives": archives.len(),
            "archive_bytes": archives.iter().map(|a| a.size_bytes).sum::<u64>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Backup volume: {}\n", dir.display());
    if stats.mounted {
        println!("  {} Mounted", "✓".green());
    } else {
        println!("  {} Not a separate mount point", "⚠".yellow());
    }
    if !is_dir_writable(dir) {
        println!("  {} Not writable", "✗".red());
    }
    println!("  Total:     {}", format_bytes(stats.total_bytes));
    println!("  Used:      {} ({:.1}%)", format_bytes(stats.used_bytes), stats.use_percent);
    println!("  Available: {}", format_bytes(stats.available_bytes));
    println!(
        "  Archives:  {} ({})",
        archives.len(),
        format_bytes(archives.iter().map(|a| a.size_bytes).sum())
    );
    Ok(())
}

fn handle_schedule(settings: &Settings, command: ScheduleCommands) -> Result<()> {
    let mut env = EnvStore::load(&settings.paths.env_file)?;

    match command {
        ScheduleCommands::Show { json } => {
            let current = env.schedule();
            if json {
                println!("{}", serde_json::to_string_pretty(&current)?);
            } else {
                println!("Backup schedule:\n");
                println!("  Minute:       {}", current.minute);
                println!("  Hour:         {}", current.hour);
                println!("  Day of month: {}", current.day_month);
                println!("  Day of week:  {}", current.day_week);
                println!("  Retention:    {} archive(s)", current.retention);
            }
        }
        ScheduleCommands::Set { retention, minute, hour, day_month, day_week } => {
            let mut next = env.schedule();
            if let Some(retention) = retention {
                next.retention = retention;
            }
            if let Some(minute) = minute {
                next.minute = minute;
            }
            if let Some(hour) = hour {
                next.hour = hour;
            }
            if let Some(day_month) = day_month {
                next.day_month = day_month;
            }
            if let Some(day_week) = day_week {
                next.day_week = day_week;
            }

            let errors = next.validate();
            if !errors.is_empty() {
                for error in &errors {
                    println!("  {} {}", "✗".red(), error);
                }
                return Err(EngineError::Config("invalid schedule".to_string()).into());
            }

            schedule::apply(
                &mut env,
                &next,
                &settings.paths.cron_file,
                &settings.paths.binary,
                &settings.paths.backup_log,
            )?;
            println!("{} Schedule saved to {}", "✓".green(), settings.paths.cron_file.display());
        }
    }

    Ok(())
}

async fn handle_maintenance(settings: Settings, command: MaintenanceCommands) -> Result<()> {
    let ctx = EngineContext::connect(settings, Interrupt::never())?;
    let maintenance = ctx.maintenance();

    match command {
        MaintenanceCommands::On => {
            maintenance.set(true).await?;
            println!("{} Maintenance mode enabled", "✓".green());
        }
        MaintenanceCommands::Off => {
            maintenance.set(false).await?;
            println!("{} Maintenance mode disabled", "✓".green());
        }
        MaintenanceCommands::Status => match maintenance.status().await {
            MaintenanceStatus::Unknown => bail!("maintenance mode state could not be determined"),
            status => println!("Maintenance mode: {}", status),
        },
    }

    Ok(())
}

async fn handle_reconcile(settings: Settings) -> Result<()> {
    let ctx = EngineContext::connect(settings, Interrupt::never())?;
    let _lock = ctx.lock().acquire()?;

    let env = EnvStore::load(&ctx.settings.paths.env_file)?;
    ctx.wait_healthy(&ctx.settings.services.database).await?;

    let reconciler = CredentialReconciler::new(ctx.database.clone(), ctx.settings.database.clone());
    let credentials = reconciler.reapply_from_env(&env).await?;

    println!("{} Database password for '{}' matches .env", "✓".green(), credentials.user);
    Ok(())
}
