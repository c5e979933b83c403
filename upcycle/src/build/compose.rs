//! Docker Compose artifact builder

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::build::Builder;
use crate::errors::UpdateError;
use crate::models::artifact::ArtifactRef;
use crate::models::component::Component;
use crate::runtime::compose::ComposeBin;

/// Builder driving `compose build` for one service at a time
#[derive(Debug, Clone)]
pub struct ComposeBuilder {
    project_dir: PathBuf,
    compose_file: String,
    compose: ComposeBin,
}

impl ComposeBuilder {
    pub fn new(project_dir: impl Into<PathBuf>, compose_file: &str, compose: ComposeBin) -> Self {
        Self {
            project_dir: project_dir.into(),
            compose_file: compose_file.to_string(),
            compose,
        }
    }
}

#[async_trait]
impl Builder for ComposeBuilder {
    async fn build(&self, component: &Component) -> Result<ArtifactRef, UpdateError> {
        info!("building service '{}'", component.service);

        let mut cmd = self.compose.command(&self.project_dir, &self.compose_file);
        cmd.args(["build", &component.service]);

        let output = cmd
            .output()
            .await
            .map_err(|e| UpdateError::RuntimeError(format!("failed to run compose: {}", e)))?;

        if !output.status.success() {
            // Carry the build tool's diagnostics verbatim
            let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(UpdateError::BuildError {
                component: component.name.clone(),
                output: diagnostics,
            });
        }

        // Compose publishes by retagging <image>:latest in the local daemon
        Ok(ArtifactRef::latest(&component.image))
    }
}
