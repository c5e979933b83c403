//! Shell-command verifier

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::errors::UpdateError;
use crate::verify::Verifier;

/// Runs a configured shell command in the project directory; non-zero exit
/// fails verification with the command's output verbatim
#[derive(Debug, Clone)]
pub struct ShellVerifier {
    project_dir: PathBuf,
    command: String,
}

impl ShellVerifier {
    pub fn new(project_dir: impl Into<PathBuf>, command: &str) -> Self {
        Self {
            project_dir: project_dir.into(),
            command: command.to_string(),
        }
    }
}

#[async_trait]
impl Verifier for ShellVerifier {
    async fn verify(&self) -> Result<(), UpdateError> {
        info!("running verification command: {}", self.command);

        let output = Command::new("bash")
            .current_dir(&self.project_dir)
            .args(["-c", &self.command])
            .output()
            .await
            .map_err(|e| UpdateError::VerificationError(format!("failed to run command: {}", e)))?;

        if !output.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(UpdateError::VerificationError(diagnostics));
        }

        info!("verification passed");
        Ok(())
    }
}
