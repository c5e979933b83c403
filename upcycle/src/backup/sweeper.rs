//! Retention sweep of aged backups

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::backup::manager::BackupManager;
use crate::errors::UpdateError;

/// Garbage-collects backups past the retention window.
///
/// The newest backup is always retained regardless of age so at least one
/// rollback target exists. `latest` tags are never touched.
pub struct RetentionSweeper {
    manager: BackupManager,
}

impl RetentionSweeper {
    pub fn new(manager: BackupManager) -> Self {
        Self { manager }
    }

    /// Remove backups older than `max_age`, returning how many were removed
    pub async fn sweep(&self, max_age: Duration, now: DateTime<Utc>) -> Result<usize, UpdateError> {
        let backups = self.manager.list().await?;
        let Some(newest) = backups.last().map(|b| b.id()) else {
            debug!("no backups to sweep");
            return Ok(0);
        };

        let registry = self.manager.registry();
        let mut removed = 0;

        for backup in &backups {
            let id = backup.id();
            if id == newest {
                continue;
            }
            if now - backup.taken_at <= max_age {
                continue;
            }

            for entry in &backup.entries {
                if entry.image_id.is_none() {
                    continue;
                }
                let tag = entry.backup_ref(backup.taken_at);
                // Best-effort per tag; a stuck tag never blocks the sweep
                if let Err(e) = registry.remove_tag(&tag).await {
                    warn!("failed to remove backup tag {}: {}", tag, e);
                }
            }

            self.manager.delete(&id).await?;
            info!("swept backup '{}'", id);
            removed += 1;
        }

        Ok(removed)
    }
}
