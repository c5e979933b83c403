//! State directory layout

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of the orchestrator's state directory
#[derive(Debug, Clone)]
pub struct StateLayout {
    /// Base directory for all state
    pub base_dir: PathBuf,
}

impl StateLayout {
    /// Create a new state layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory holding backup manifests
    pub fn backups_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("backups"))
    }

    /// The exclusive run lock file
    pub fn lock_file(&self) -> File {
        File::new(self.base_dir.join("update.lock"))
    }

    /// Setup the state layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::UpdateError> {
        self.backups_dir().create().await?;
        Ok(())
    }
}

impl Default for StateLayout {
    fn default() -> Self {
        Self::new(PathBuf::from(".upcycle"))
    }
}
