//! Git source sync

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::UpdateError;
use crate::source::{SourceSync, SyncResult};

/// Source sync over a git checkout
#[derive(Debug, Clone)]
pub struct GitSource {
    project_dir: PathBuf,
    remote: String,
    branch: String,
}

impl GitSource {
    pub fn new(project_dir: impl Into<PathBuf>, remote: &str, branch: &str) -> Self {
        Self {
            project_dir: project_dir.into(),
            remote: remote.to_string(),
            branch: branch.to_string(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, UpdateError> {
        let output = Command::new("git")
            .current_dir(&self.project_dir)
            .args(args)
            .output()
            .await
            .map_err(|e| UpdateError::SyncError(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(UpdateError::SyncError(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn head(&self) -> Result<String, UpdateError> {
        Ok(self.git(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }
}

#[async_trait]
impl SourceSync for GitSource {
    async fn local_changes(&self) -> Result<Option<String>, UpdateError> {
        let status = self.git(&["status", "--porcelain"]).await?;
        let trimmed = status.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    async fn sync(&self) -> Result<SyncResult, UpdateError> {
        let had_local_changes = self.local_changes().await?.is_some();
        let before = self.head().await?;

        debug!("fetching {}...", self.remote);
        self.git(&["fetch", &self.remote]).await?;

        // Fast-forward only: a merge that would touch local work fails
        // instead of discarding or entangling it
        let target = format!("{}/{}", self.remote, self.branch);
        self.git(&["merge", "--ff-only", &target]).await?;

        let after = self.head().await?;
        let updated = before != after;
        if updated {
            info!("source updated to {}", &after[..after.len().min(12)]);
        } else {
            debug!("source already up to date");
        }

        Ok(SyncResult {
            had_local_changes,
            updated,
        })
    }

    async fn available(&self) -> bool {
        Command::new("git")
            .current_dir(&self.project_dir)
            .args(["rev-parse", "--git-dir"])
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}
