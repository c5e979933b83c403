//! Docker Compose component runtime

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::UpdateError;
use crate::models::component::Component;
use crate::runtime::ComponentRuntime;

/// Which compose binary is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeBin {
    /// `docker compose` (plugin)
    Plugin,
    /// `docker-compose` (legacy standalone binary)
    Legacy,
}

impl ComposeBin {
    /// Prefer the plugin, fall back to the legacy binary
    pub async fn detect() -> Result<Self, UpdateError> {
        let plugin = Command::new("docker")
            .args(["compose", "version"])
            .output()
            .await;
        if matches!(plugin, Ok(ref o) if o.status.success()) {
            return Ok(ComposeBin::Plugin);
        }

        debug!("'docker compose' unavailable, trying 'docker-compose'...");
        let legacy = Command::new("docker-compose").arg("version").output().await;
        if matches!(legacy, Ok(ref o) if o.status.success()) {
            return Ok(ComposeBin::Legacy);
        }

        Err(UpdateError::PreconditionError(
            "neither 'docker compose' nor 'docker-compose' is available".to_string(),
        ))
    }

    /// Base command with the project dir and compose file applied
    pub fn command(&self, project_dir: &Path, compose_file: &str) -> Command {
        let mut cmd = match self {
            ComposeBin::Plugin => {
                let mut cmd = Command::new("docker");
                cmd.arg("compose");
                cmd
            }
            ComposeBin::Legacy => Command::new("docker-compose"),
        };
        cmd.current_dir(project_dir);
        cmd.args(["-f", compose_file]);
        cmd
    }
}

/// Runtime driving services through docker compose
#[derive(Debug, Clone)]
pub struct ComposeRuntime {
    project_dir: PathBuf,
    compose_file: String,
    compose: ComposeBin,
}

impl ComposeRuntime {
    pub fn new(project_dir: impl Into<PathBuf>, compose_file: &str, compose: ComposeBin) -> Self {
        Self {
            project_dir: project_dir.into(),
            compose_file: compose_file.to_string(),
            compose,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(), UpdateError> {
        let mut cmd = self.compose.command(&self.project_dir, &self.compose_file);
        cmd.args(args);

        let output = cmd
            .output()
            .await
            .map_err(|e| UpdateError::RuntimeError(format!("failed to run compose: {}", e)))?;

        if !output.status.success() {
            return Err(UpdateError::RuntimeError(format!(
                "compose {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ComponentRuntime for ComposeRuntime {
    async fn start(&self, component: &Component) -> Result<(), UpdateError> {
        info!("starting service '{}'", component.service);
        // Dependency order is the orchestrator's job, hence --no-deps;
        // images were built in the previous phase, hence --no-build
        self.run(&["up", "-d", "--no-deps", "--no-build", &component.service])
            .await
    }

    async fn stop(&self, component: &Component) -> Result<(), UpdateError> {
        info!("stopping service '{}'", component.service);
        // `compose stop` succeeds on an already-stopped service
        self.run(&["stop", &component.service]).await
    }

    async fn available(&self) -> bool {
        ComposeBin::detect().await.is_ok()
    }
}
