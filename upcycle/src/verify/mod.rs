//! Post-update verification boundary

pub mod shell;

use async_trait::async_trait;

use crate::errors::UpdateError;

/// Runs the post-update verification suite (`full-test` scope)
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self) -> Result<(), UpdateError>;
}
