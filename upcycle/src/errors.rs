//! Error types for the update orchestrator

use thiserror::Error;

/// Main error type for upcycle
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Precondition failed: {0}")]
    PreconditionError(String),

    #[error("Source conflict: {0}")]
    SourceConflictError(String),

    #[error("Backup tag conflict: {0}")]
    TagConflictError(String),

    #[error("Source sync failed: {0}")]
    SyncError(String),

    #[error("Build failed for '{component}':\n{output}")]
    BuildError { component: String, output: String },

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Backup error: {0}")]
    BackupError(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Verification failed:\n{0}")]
    VerificationError(String),

    #[error("Another update is in progress: {0}")]
    LockedError(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("Rollback failed (backup '{backup}' needed for manual recovery): {reason}")]
    RollbackFailed { backup: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
