//! Docker daemon as the artifact registry

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::UpdateError;
use crate::models::artifact::{ArtifactRef, ImageId};
use crate::registry::ArtifactRegistry;

/// Registry backed by the local docker daemon's image store
#[derive(Debug, Clone, Default)]
pub struct DockerRegistry;

impl DockerRegistry {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactRegistry for DockerRegistry {
    async fn image_id(&self, artifact: &ArtifactRef) -> Result<Option<ImageId>, UpdateError> {
        let output = Command::new("docker")
            .args(["image", "inspect", "--format", "{{.Id}}", &artifact.reference()])
            .output()
            .await
            .map_err(|e| UpdateError::RegistryError(format!("failed to run docker: {}", e)))?;

        if !output.status.success() {
            // Inspect fails when the reference does not exist
            debug!("no image for {}", artifact);
            return Ok(None);
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Ok(None);
        }
        Ok(Some(ImageId(id)))
    }

    async fn tag(&self, from: &ArtifactRef, to: &ArtifactRef) -> Result<(), UpdateError> {
        debug!("tagging {} -> {}", from, to);
        let output = Command::new("docker")
            .args(["tag", &from.reference(), &to.reference()])
            .output()
            .await
            .map_err(|e| UpdateError::RegistryError(format!("failed to run docker: {}", e)))?;

        if !output.status.success() {
            return Err(UpdateError::RegistryError(format!(
                "docker tag {} {} failed: {}",
                from,
                to,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn remove_tag(&self, artifact: &ArtifactRef) -> Result<(), UpdateError> {
        debug!("removing tag {}", artifact);
        let output = Command::new("docker")
            .args(["rmi", &artifact.reference()])
            .output()
            .await
            .map_err(|e| UpdateError::RegistryError(format!("failed to run docker: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Removing an already-absent tag is a no-op
            if stderr.contains("No such image") {
                return Ok(());
            }
            return Err(UpdateError::RegistryError(format!(
                "docker rmi {} failed: {}",
                artifact,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, UpdateError> {
        let output = Command::new("docker")
            .args(["image", "ls", repository, "--format", "{{.Tag}}"])
            .output()
            .await
            .map_err(|e| UpdateError::RegistryError(format!("failed to run docker: {}", e)))?;

        if !output.status.success() {
            return Err(UpdateError::RegistryError(format!(
                "docker image ls {} failed: {}",
                repository,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let tags = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty() && l != "<none>")
            .collect();
        Ok(tags)
    }

    async fn available(&self) -> bool {
        Command::new("docker")
            .args(["version", "--format", "{{.Server.Version}}"])
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}
