//! Source control boundary

pub mod git;

use async_trait::async_trait;

use crate::errors::UpdateError;

/// Outcome of one source sync
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Uncommitted local modifications were present in the tree
    pub had_local_changes: bool,

    /// The checkout moved to a new revision
    pub updated: bool,
}

/// Pulls the latest versioned source tree.
///
/// Local modifications are never discarded; they are surfaced so the
/// orchestrator can put the decision in front of the operator.
#[async_trait]
pub trait SourceSync: Send + Sync {
    /// Uncommitted local changes, as a human-readable summary, if any
    async fn local_changes(&self) -> Result<Option<String>, UpdateError>;

    /// Fetch and merge the latest upstream source
    async fn sync(&self) -> Result<SyncResult, UpdateError>;

    /// Whether the source tree responds at all (preflight check)
    async fn available(&self) -> bool;
}
