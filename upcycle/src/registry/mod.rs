//! Artifact registry boundary

pub mod docker;

use async_trait::async_trait;

use crate::errors::UpdateError;
use crate::models::artifact::{ArtifactRef, ImageId};

/// Tag-level operations against the artifact store.
///
/// The orchestrator depends only on "tag now points here" and "list tags";
/// backups are created by aliasing `latest` and restored by re-pointing it.
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// Resolve the image id a reference currently points at, if any
    async fn image_id(&self, artifact: &ArtifactRef) -> Result<Option<ImageId>, UpdateError>;

    /// Point `to` at the same image as `from`
    async fn tag(&self, from: &ArtifactRef, to: &ArtifactRef) -> Result<(), UpdateError>;

    /// Remove a tag (the underlying image survives while other tags reference it)
    async fn remove_tag(&self, artifact: &ArtifactRef) -> Result<(), UpdateError>;

    /// List the tags of a repository
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, UpdateError>;

    /// Whether the registry responds at all (preflight check)
    async fn available(&self) -> bool;
}
