/// Service control seam
///
/// Lifecycle, health and administrative commands of the managed
/// applications. Implemented against docker compose by `DockerManager`.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::core::health::ServiceHealthState;

/// Administrative repair commands run against the file-sync application
/// after a restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStep {
    /// `occ maintenance:repair`
    Repair,
    /// `occ maintenance:data-fingerprint`
    DataFingerprint,
    /// `occ files:scan --all`
    RescanFiles,
}

impl RepairStep {
    pub fn occ_args(&self) -> &'static [&'static str] {
        match self {
            RepairStep::Repair => &["maintenance:repair"],
            RepairStep::DataFingerprint => &["maintenance:data-fingerprint"],
            RepairStep::RescanFiles => &["files:scan", "--all"],
        }
    }
}

impl fmt::Display for RepairStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "occ {}", self.occ_args().join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceStatus {
    Enabled,
    Disabled,
    Unknown,
}

impl MaintenanceStatus {
    /// Parse the output of `occ maintenance:mode`
    pub fn from_occ_output(output: &str) -> Self {
        let lower = output.to_lowercase();
        if lower.contains("enabled") {
            MaintenanceStatus::Enabled
        } else if lower.contains("disabled") {
            MaintenanceStatus::Disabled
        } else {
            MaintenanceStatus::Unknown
        }
    }
}

impl fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaintenanceStatus::Enabled => "enabled",
            MaintenanceStatus::Disabled => "disabled",
            MaintenanceStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Current health of a compose service
    async fn status(&self, service: &str) -> Result<ServiceHealthState>;

    /// Whether the service is defined/deployed at all on this host
    async fn is_installed(&self, service: &str) -> Result<bool>;

    async fn start(&self, service: &str) -> Result<()>;

    async fn stop(&self, service: &str) -> Result<()>;

    async fn enter_maintenance(&self) -> Result<()>;

    async fn exit_maintenance(&self) -> Result<()>;

    async fn maintenance_status(&self) -> Result<MaintenanceStatus>;

    async fn repair(&self, step: RepairStep) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maintenance_status_parsing() {
        assert_eq!(
            MaintenanceStatus::from_occ_output("Maintenance mode is currently enabled\n"),
            MaintenanceStatus::Enabled
        );
        assert_eq!(
            MaintenanceStatus::from_occ_output("Maintenance mode is currently disabled"),
            MaintenanceStatus::Disabled
        );
        assert_eq!(MaintenanceStatus::from_occ_output(""), MaintenanceStatus::Unknown);
    }

    #[test]
    fn test_repair_step_display() {
        assert_eq!(RepairStep::RescanFiles.to_string(), "occ files:scan --all");
        assert_eq!(RepairStep::Repair.to_string(), "occ maintenance:repair");
    }
}
