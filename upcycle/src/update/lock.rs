//! Exclusive run lock

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::UpdateError;
use crate::filesys::file::File;

/// What the lock file records about its holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Whole-run mutual exclusion via an exclusively-created lock file.
///
/// Interleaved backup/restart steps from two runs would corrupt the
/// backup-restore invariant, so the entire transaction holds the lock.
/// A stale lock (crashed holder) is not broken automatically; the error
/// names the recorded pid so the operator can remove the file.
pub struct UpdateLock {
    file: File,
    held: bool,
}

impl UpdateLock {
    /// Acquire the lock, failing immediately if another run holds it
    pub async fn acquire(file: File) -> Result<Self, UpdateError> {
        let info = LockInfo {
            pid: std::process::id(),
            started_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&info)?;

        if !file.try_create_new(&contents).await? {
            let detail = match file.read_json::<LockInfo>().await {
                Ok(holder) => format!(
                    "held by pid {} since {} ({})",
                    holder.pid,
                    holder.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    file.path().display()
                ),
                Err(_) => format!("lock file exists: {}", file.path().display()),
            };
            return Err(UpdateError::LockedError(detail));
        }

        Ok(Self { file, held: true })
    }

    /// Release the lock explicitly
    pub async fn release(mut self) -> Result<(), UpdateError> {
        self.held = false;
        self.file.delete().await
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        // Fallback for paths that never reach release()
        if self.held {
            if let Err(e) = std::fs::remove_file(self.file.path()) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove lock file {}: {}", self.file.path().display(), e);
                }
            }
        }
    }
}
