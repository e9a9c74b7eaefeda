/// Readiness gate for managed services
///
/// Health is observed through the container health checks defined in
/// docker-compose.yml. The gate polls at a fixed interval until the service
/// reports healthy or the timeout elapses, and returns a typed timeout so
/// each caller decides whether non-readiness is fatal.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::error::{EngineError, EngineResult};
use crate::core::services::ServiceControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealthState {
    Unknown,
    Starting,
    Healthy,
    Unhealthy,
}

impl ServiceHealthState {
    /// Map docker container state + optional healthcheck status.
    ///
    /// Containers without a healthcheck count as healthy while running.
    pub fn from_docker(state: &str, health: Option<&str>) -> Self {
        let state = state.to_lowercase();
        // Check unhealthy BEFORE healthy (unhealthy contains "healthy" as substring)
        match health.map(|h| h.to_lowercase()) {
            Some(h) if h.contains("unhealthy") => ServiceHealthState::Unhealthy,
            Some(h) if h.contains("starting") => ServiceHealthState::Starting,
            Some(h) if h.contains("healthy") && state.contains("running") => {
                ServiceHealthState::Healthy
            }
            _ => {
                if state.contains("running") {
                    ServiceHealthState::Healthy
                } else if state.contains("restarting") || state.contains("created") {
                    ServiceHealthState::Starting
                } else if state.contains("exited") || state.contains("dead") {
                    ServiceHealthState::Unhealthy
                } else {
                    ServiceHealthState::Unknown
                }
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealthState::Healthy)
    }
}

impl fmt::Display for ServiceHealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceHealthState::Unknown => "unknown",
            ServiceHealthState::Starting => "starting",
            ServiceHealthState::Healthy => "healthy",
            ServiceHealthState::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

#[derive(Clone)]
pub struct ReadinessGate {
    services: Arc<dyn ServiceControl>,
    poll_interval: Duration,
}

impl ReadinessGate {
    pub fn new(services: Arc<dyn ServiceControl>, poll_interval: Duration) -> Self {
        Self {
            services,
            poll_interval,
        }
    }

    /// Poll `service` until healthy or `timeout` elapses.
    ///
    /// A failing status query counts as `unknown` and polling continues.
    pub async fn wait_healthy(&self, service: &str, timeout: Duration) -> EngineResult<()> {
        let started = Instant::now();

        loop {
            let last_state = match self.services.status(service).await {
                Ok(state) => state,
                Err(e) => {
                    debug!(service, error = %e, "health query failed");
                    ServiceHealthState::Unknown
                }
            };

            if last_state.is_healthy() {
                info!(service, waited_ms = started.elapsed().as_millis() as u64, "service healthy");
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(EngineError::ServiceTimeout {
                    service: service.to_string(),
                    waited: elapsed,
                    last_state,
                });
            }

            debug!(service, state = %last_state, "waiting for service");
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}
