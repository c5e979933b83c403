//! Artifact builder boundary

pub mod compose;

use async_trait::async_trait;

use crate::errors::UpdateError;
use crate::models::artifact::ArtifactRef;
use crate::models::component::Component;

/// Produces and publishes a new artifact for a component.
///
/// Publishing means the component's `latest` tag points at the new image
/// when `build` returns.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, component: &Component) -> Result<ArtifactRef, UpdateError>;
}
