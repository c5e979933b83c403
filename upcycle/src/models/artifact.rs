//! Artifact references and image identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The tag that always denotes the currently-deployed artifact
pub const LATEST_TAG: &str = "latest";

/// Format a backup id from the instant the backup was taken.
///
/// Backup identity is the (second-resolution) UTC timestamp; the same string
/// names the manifest file and the registry tag suffix.
pub fn backup_id(taken_at: DateTime<Utc>) -> String {
    taken_at.format("%Y%m%d-%H%M%S").to_string()
}

/// A (repository, tag) pair naming one image in the artifact store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub repository: String,
    pub tag: String,
}

impl ArtifactRef {
    /// The `latest` alias for a repository
    pub fn latest(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            tag: LATEST_TAG.to_string(),
        }
    }

    /// The immutable backup tag for a repository at a point in time
    pub fn backup(repository: &str, taken_at: DateTime<Utc>) -> Self {
        Self {
            repository: repository.to_string(),
            tag: format!("backup-{}", backup_id(taken_at)),
        }
    }

    /// Full `repository:tag` reference
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    pub fn is_backup(&self) -> bool {
        self.tag.starts_with("backup-")
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Opaque image identity reported by the registry for a (repo, tag).
///
/// Two tags point at the same artifact iff their image ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub String);

impl ImageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::utils::short_image_id(&self.0))
    }
}
