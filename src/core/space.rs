/// Space preflight estimator
///
/// Peak usage = (data tree + database + config overhead) × safety factor,
/// since the staging tree and the final archive coexist on the backup volume.

use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::core::catalog::Strategy;
use crate::core::database::Database;
use crate::core::error::{EngineError, EngineResult};
use crate::utils::app_config::SpaceSettings;
use crate::utils::{dir_size, format_bytes};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceEstimate {
    pub data_bytes: u64,
    pub database_bytes: u64,
    /// True when the database could not report its size and the fallback was used
    pub database_fallback: bool,
    pub overhead_bytes: u64,
    pub safety_factor: u64,
    pub required_bytes: u64,
}

impl SpaceEstimate {
    /// Abort unless `available` covers the projected peak usage
    pub fn check(&self, available: u64) -> EngineResult<()> {
        if available < self.required_bytes {
            return Err(EngineError::InsufficientSpace {
                required: self.required_bytes,
                available,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SpacePreflight {
    settings: SpaceSettings,
}

impl SpacePreflight {
    pub fn new(settings: SpaceSettings) -> Self {
        Self { settings }
    }

    /// Pure estimate. `database_bytes = None` means the size query failed.
    pub fn estimate(&self, strategy: Strategy, data_bytes: u64, database_bytes: Option<u64>) -> SpaceEstimate {
        let factor = self.settings.safety_factor.max(1);

        let (database, fallback, overhead) = match strategy {
            Strategy::DataOnly => (0, false, 0),
            Strategy::Full => match database_bytes {
                Some(bytes) => (bytes, false, self.settings.config_overhead_bytes),
                None => (self.settings.db_fallback_bytes, true, self.settings.config_overhead_bytes),
            },
        };

        let required = data_bytes
            .saturating_add(database)
            .saturating_add(overhead)
            .saturating_mul(factor);

        SpaceEstimate {
            data_bytes,
            database_bytes: database,
            database_fallback: fallback,
            overhead_bytes: overhead,
            safety_factor: factor,
            required_bytes: required,
        }
    }

    /// Measure the data tree and ask the database engine for its size.
    /// Never fails: an unreachable database falls back to the configured constant.
    pub async fn measure(&self, strategy: Strategy, data_dir: &Path, database: &dyn Database) -> SpaceEstimate {
        let data_path = data_dir.to_path_buf();
        let data_bytes = tokio::task::spawn_blocking(move || dir_size(&data_path))
            .await
            .unwrap_or(0);

        let database_bytes = match strategy {
            Strategy::DataOnly => None,
            Strategy::Full => match database.size_estimate().await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "database size query failed, using fallback estimate");
                    None
                }
            },
        };

        let estimate = self.estimate(strategy, data_bytes, database_bytes);
        info!(
            data = %format_bytes(estimate.data_bytes),
            database = %format_bytes(estimate.database_bytes),
            required = %format_bytes(estimate.required_bytes),
            "space preflight estimate"
        );
        estimate
    }
}
