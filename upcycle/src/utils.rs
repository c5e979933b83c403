//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Shorten an image id for display ("sha256:abcd..." -> "abcdef123456")
pub fn short_image_id(id: &str) -> &str {
    let bare = id.strip_prefix("sha256:").unwrap_or(id);
    if bare.len() > 12 {
        &bare[..12]
    } else {
        bare
    }
}
