//! Backups of artifact references

pub mod manager;
pub mod sweeper;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::artifact::{backup_id, ArtifactRef, ImageId};

/// What `latest` pointed at for one component just before an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub component: String,
    pub repository: String,

    /// `None` records "no prior artifact" (first-ever deploy); restoring it
    /// stops the component and removes `latest` instead of restarting
    pub image_id: Option<ImageId>,
}

impl BackupEntry {
    /// The immutable backup tag for this entry, given the backup's timestamp
    pub fn backup_ref(&self, taken_at: DateTime<Utc>) -> ArtifactRef {
        ArtifactRef::backup(&self.repository, taken_at)
    }
}

/// Point-in-time snapshot of artifact references, persisted as a JSON
/// manifest keyed by its timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub taken_at: DateTime<Utc>,
    pub entries: Vec<BackupEntry>,
}

impl Backup {
    /// Structured identity derived from the timestamp; names the manifest
    /// file and the registry tag suffix
    pub fn id(&self) -> String {
        backup_id(self.taken_at)
    }

    pub fn entry(&self, component: &str) -> Option<&BackupEntry> {
        self.entries.iter().find(|e| e.component == component)
    }
}
