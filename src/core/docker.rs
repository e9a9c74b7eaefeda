/// Docker and Docker Compose integration
///
/// Service health comes from the Docker API; lifecycle and administrative
/// commands go through `docker compose` in the appliance project directory.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::Docker;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::core::health::ServiceHealthState;
use crate::core::services::{MaintenanceStatus, RepairStep, ServiceControl};

/// Where a compose command reads stdin from / writes stdout to
#[derive(Debug, Clone, Copy)]
pub enum Redirect<'a> {
    Capture,
    StdinFrom(&'a Path),
    StdoutTo(&'a Path),
}

/// Runner for `docker compose` in one project directory
#[derive(Debug, Clone)]
pub struct Compose {
    project_dir: PathBuf,
}

impl Compose {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Execute docker-compose command
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        self.run_with(args, &[], Redirect::Capture).await
    }

    /// Execute docker-compose command with extra client environment and redirection.
    ///
    /// `env` is set on the docker client process only; pair it with
    /// `exec -e KEY` so values never appear on a command line.
    pub async fn run_with(&self, args: &[&str], env: &[(&str, &str)], io: Redirect<'_>) -> Result<String> {
        let mut cmd = Command::new("docker");
        cmd.arg("compose")
            .args(args)
            .current_dir(&self.project_dir)
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        match io {
            Redirect::Capture => {
                cmd.stdin(Stdio::null()).stdout(Stdio::piped());
            }
            Redirect::StdinFrom(path) => {
                let file = std::fs::File::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                cmd.stdin(Stdio::from(file)).stdout(Stdio::piped());
            }
            Redirect::StdoutTo(path) => {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                cmd.stdin(Stdio::null()).stdout(Stdio::from(file));
            }
        }

        debug!(args = ?args, "docker compose");
        let output = cmd
            .output()
            .await
            .context("Failed to execute docker compose command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Docker compose command failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[derive(Clone)]
pub struct DockerManager {
    docker: Docker,
    compose: Compose,
    app_service: String,
}

impl DockerManager {
    pub fn new(project_dir: &Path, app_service: &str) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon. Is Docker running?")?;

        let compose_file = project_dir.join("docker-compose.yml");
        if !compose_file.exists() {
            return Err(anyhow!(
                "docker-compose.yml not found at {}",
                compose_file.display()
            ));
        }

        Ok(Self {
            docker,
            compose: Compose::new(project_dir),
            app_service: app_service.to_string(),
        })
    }

    pub fn compose(&self) -> &Compose {
        &self.compose
    }

    /// Run `php occ` inside the file-sync application container as www-data
    async fn occ(&self, occ_args: &[&str]) -> Result<String> {
        let mut args = vec!["exec", "-T", "-u", "www-data", self.app_service.as_str(), "php", "occ"];
        args.extend_from_slice(occ_args);
        self.compose.run(&args).await
    }

    /// Find the container id of a compose service belonging to this project
    async fn container_id(&self, service: &str) -> Result<Option<String>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![
                format!("com.docker.compose.service={}", service),
                format!(
                    "com.docker.compose.project.working_dir={}",
                    self.compose.project_dir().display()
                ),
            ],
        );

        let options = Some(ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await?;
        Ok(containers.into_iter().find_map(|c| c.id))
    }
}

#[async_trait]
impl ServiceControl for DockerManager {
    async fn status(&self, service: &str) -> Result<ServiceHealthState> {
        let Some(id) = self.container_id(service).await? else {
            return Ok(ServiceHealthState::Unknown);
        };

        let inspect = self
            .docker
            .inspect_container(&id, None::<InspectContainerOptions>)
            .await
            .with_context(|| format!("Failed to inspect container of {}", service))?;

        let state = inspect.state.unwrap_or_default();
        let status = state.status.map(|s| s.to_string()).unwrap_or_default();
        let health = state
            .health
            .and_then(|h| h.status)
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty() && s != "none");

        Ok(ServiceHealthState::from_docker(&status, health.as_deref()))
    }

    async fn is_installed(&self, service: &str) -> Result<bool> {
        let services = self.compose.run(&["config", "--services"]).await?;
        Ok(services.lines().any(|line| line.trim() == service))
    }

    async fn start(&self, service: &str) -> Result<()> {
        self.compose.run(&["up", "-d", service]).await?;
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<()> {
        self.compose.run(&["stop", service]).await?;
        Ok(())
    }

    async fn enter_maintenance(&self) -> Result<()> {
        self.occ(&["maintenance:mode", "--on"]).await?;
        Ok(())
    }

    async fn exit_maintenance(&self) -> Result<()> {
        self.occ(&["maintenance:mode", "--off"]).await?;
        Ok(())
    }

    async fn maintenance_status(&self) -> Result<MaintenanceStatus> {
        let output = self.occ(&["maintenance:mode"]).await?;
        Ok(MaintenanceStatus::from_occ_output(&output))
    }

    async fn repair(&self, step: RepairStep) -> Result<()> {
        self.occ(step.occ_args()).await?;
        Ok(())
    }
}
