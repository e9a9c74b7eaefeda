/// Maintenance mode controller
///
/// Entering is best-effort. Leaving is attempted whenever entering was
/// attempted, since a failed `--on` may still have flipped the flag; a failure
/// to leave is escalated because the application stays unusable.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::services::{MaintenanceStatus, ServiceControl};

/// Outcome of `enter`, to be handed back to `exit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceWindow {
    pub entered: bool,
}

pub struct MaintenanceController {
    services: Arc<dyn ServiceControl>,
}

impl MaintenanceController {
    pub fn new(services: Arc<dyn ServiceControl>) -> Self {
        Self { services }
    }

    pub async fn enter(&self) -> MaintenanceWindow {
        match self.services.enter_maintenance().await {
            Ok(()) => {
                info!("maintenance mode on");
                MaintenanceWindow { entered: true }
            }
            Err(e) => {
                warn!(error = %e, "could not enable maintenance mode, continuing without it");
                MaintenanceWindow { entered: false }
            }
        }
    }

    /// Leave maintenance mode. Returns the operator warning when that fails.
    pub async fn exit(&self, window: MaintenanceWindow) -> Option<String> {
        match self.services.exit_maintenance().await {
            Ok(()) => {
                info!(was_entered = window.entered, "maintenance mode off");
                None
            }
            Err(e) => {
                let message = format!(
                    "maintenance mode could not be disabled ({:#}); run `homebrain-backup maintenance off`",
                    e
                );
                error!("{}", message);
                Some(message)
            }
        }
    }

    pub async fn status(&self) -> MaintenanceStatus {
        match self.services.maintenance_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "maintenance status query failed");
                MaintenanceStatus::Unknown
            }
        }
    }

    /// Operator toggle
    pub async fn set(&self, on: bool) -> Result<()> {
        if on {
            self.services.enter_maintenance().await?;
        } else {
            self.services.exit_maintenance().await?;
        }
        info!(on, "maintenance mode changed by operator");
        Ok(())
    }
}
