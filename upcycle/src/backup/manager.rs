//! Backup snapshot and restore

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backup::{Backup, BackupEntry};
use crate::errors::UpdateError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::artifact::{backup_id, ArtifactRef};
use crate::models::component::Component;
use crate::registry::ArtifactRegistry;
use crate::storage::layout::StateLayout;

/// Snapshots artifact references before an update and restores them after a
/// failed one. Backups are immutable once created; only the sweeper deletes
/// them.
#[derive(Clone)]
pub struct BackupManager {
    registry: Arc<dyn ArtifactRegistry>,
    backups_dir: Dir,
}

impl BackupManager {
    pub fn new(registry: Arc<dyn ArtifactRegistry>, layout: &StateLayout) -> Self {
        Self {
            registry,
            backups_dir: layout.backups_dir(),
        }
    }

    fn manifest_file(&self, id: &str) -> File {
        self.backups_dir.file(&format!("{}.json", id))
    }

    /// Tag every component's current `latest` as `backup-<timestamp>` and
    /// persist the manifest.
    ///
    /// All-or-nothing: if any step fails, backup tags already created for
    /// this run are removed before the error is returned.
    pub async fn snapshot(
        &self,
        components: &[Component],
        taken_at: DateTime<Utc>,
    ) -> Result<Backup, UpdateError> {
        let id = backup_id(taken_at);
        let manifest = self.manifest_file(&id);
        if manifest.exists().await {
            return Err(UpdateError::TagConflictError(format!(
                "backup '{}' already exists",
                id
            )));
        }

        let mut entries = Vec::with_capacity(components.len());
        let mut created: Vec<ArtifactRef> = Vec::new();

        let result: Result<Backup, UpdateError> = async {
            for component in components {
                let latest = ArtifactRef::latest(&component.image);
                let backup_tag = ArtifactRef::backup(&component.image, taken_at);

                if self.registry.image_id(&backup_tag).await?.is_some() {
                    return Err(UpdateError::TagConflictError(format!(
                        "backup tag {} already exists",
                        backup_tag
                    )));
                }

                let current = self.registry.image_id(&latest).await?;
                match &current {
                    Some(image_id) => {
                        self.registry.tag(&latest, &backup_tag).await?;
                        created.push(backup_tag);
                        debug!("backed up {} ({})", latest, image_id);
                    }
                    None => {
                        // First-ever deploy: record the absence itself
                        debug!("no prior artifact for '{}'", component.name);
                    }
                }

                entries.push(BackupEntry {
                    component: component.name.clone(),
                    repository: component.image.clone(),
                    image_id: current,
                });
            }

            let backup = Backup { taken_at, entries };
            manifest.write_json(&backup).await?;
            Ok(backup)
        }
        .await;

        match result {
            Ok(backup) => {
                info!("backup '{}' created for {} component(s)", id, components.len());
                Ok(backup)
            }
            Err(e) => {
                // Partial backups are not acceptable; undo what was created
                for tag in &created {
                    if let Err(cleanup_err) = self.registry.remove_tag(tag).await {
                        warn!("failed to remove partial backup tag {}: {}", tag, cleanup_err);
                    }
                }
                let _ = manifest.delete().await;
                Err(e)
            }
        }
    }

    /// Re-point `latest` at each entry's recorded reference.
    ///
    /// Idempotent: entries whose `latest` already matches are skipped, so a
    /// second invocation is a no-op.
    pub async fn restore(&self, backup: &Backup) -> Result<(), UpdateError> {
        for entry in &backup.entries {
            let latest = ArtifactRef::latest(&entry.repository);
            let current = self.registry.image_id(&latest).await?;

            match &entry.image_id {
                Some(target) => {
                    if current.as_ref() == Some(target) {
                        debug!("{} already at {}, skipping", latest, target);
                        continue;
                    }
                    let backup_tag = entry.backup_ref(backup.taken_at);
                    self.registry.tag(&backup_tag, &latest).await?;
                    info!("restored {} to {}", latest, target);
                }
                None => {
                    // No prior artifact: restore means untagged
                    if current.is_some() {
                        self.registry.remove_tag(&latest).await?;
                        info!("removed {} (no pre-update artifact)", latest);
                    }
                }
            }
        }
        Ok(())
    }

    /// Load one backup by id
    pub async fn load(&self, id: &str) -> Result<Backup, UpdateError> {
        let manifest = self.manifest_file(id);
        if !manifest.exists().await {
            return Err(UpdateError::BackupError(format!("no backup '{}'", id)));
        }
        manifest.read_json().await
    }

    /// List all backups, oldest first
    pub async fn list(&self) -> Result<Vec<Backup>, UpdateError> {
        if !self.backups_dir.exists().await {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for path in self.backups_dir.list_files().await? {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match File::new(&path).read_json::<Backup>().await {
                Ok(backup) => backups.push(backup),
                Err(e) => {
                    // Foreign files in the backups dir are left alone
                    warn!("skipping unreadable manifest {}: {}", path.display(), e);
                }
            }
        }

        backups.sort_by_key(|b| b.taken_at);
        Ok(backups)
    }

    /// Delete one backup's manifest
    pub async fn delete(&self, id: &str) -> Result<(), UpdateError> {
        self.manifest_file(id).delete().await
    }

    /// The registry this manager tags against
    pub fn registry(&self) -> Arc<dyn ArtifactRegistry> {
        self.registry.clone()
    }
}
