//! Settings file management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::errors::UpdateError;
use crate::filesys::file::File;
use crate::health::ProbeOptions;
use crate::logs::LogLevel;
use crate::models::component::{deployment_order, Component};

/// Default settings file looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "upcycle.json";

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Source checkout the stack builds from
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    /// Compose file driving builds and restarts
    #[serde(default = "default_compose_file")]
    pub compose_file: String,

    /// State directory (backup manifests, run lock)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Source control configuration
    #[serde(default)]
    pub source: SourceSettings,

    /// Health probe configuration
    #[serde(default)]
    pub health: HealthSettings,

    /// Days a superseded backup is kept before the sweeper may remove it
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Environment variables that must be present and non-empty before an
    /// update may proceed; values are treated as secrets and never logged
    #[serde(default = "default_required_env")]
    pub required_env: Vec<String>,

    /// Shell command run after health checks for `full-test` scope
    #[serde(default)]
    pub verify_command: Option<String>,

    /// The deployable components, forming a DAG via `depends_on`
    #[serde(default = "default_components")]
    pub components: Vec<Component>,
}

fn default_project_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_compose_file() -> String {
    "docker-compose.production.yml".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".upcycle")
}

fn default_retention_days() -> i64 {
    7
}

fn default_required_env() -> Vec<String> {
    vec!["BOT_TOKEN".to_string()]
}

fn default_components() -> Vec<Component> {
    vec![
        Component {
            name: "llm".to_string(),
            service: "llm-service".to_string(),
            image: "paper-review/llm".to_string(),
            health_endpoint: Url::parse("http://localhost:8000/health")
                .expect("valid default endpoint"),
            depends_on: vec![],
        },
        Component {
            name: "bot".to_string(),
            service: "bot".to_string(),
            image: "paper-review/bot".to_string(),
            health_endpoint: Url::parse("http://localhost:8080/health")
                .expect("valid default endpoint"),
            depends_on: vec!["llm".to_string()],
        },
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            project_dir: default_project_dir(),
            compose_file: default_compose_file(),
            state_dir: default_state_dir(),
            source: SourceSettings::default(),
            health: HealthSettings::default(),
            retention_days: default_retention_days(),
            required_env: default_required_env(),
            verify_command: None,
            components: default_components(),
        }
    }
}

impl Settings {
    /// Load settings from a file.
    ///
    /// A missing explicit path is an error; a missing default path falls
    /// back to `Settings::default()`.
    pub async fn load(path: Option<&Path>) -> Result<Self, UpdateError> {
        let (file, explicit) = match path {
            Some(p) => (File::new(p), true),
            None => (File::new(DEFAULT_SETTINGS_FILE), false),
        };

        if !file.exists().await {
            if explicit {
                return Err(UpdateError::ConfigError(format!(
                    "settings file not found: {}",
                    file.path().display()
                )));
            }
            info!("no settings file found, using defaults");
            let settings = Settings::default();
            settings.validate()?;
            return Ok(settings);
        }

        let settings: Settings = file.read_json().await?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the component set forms a DAG with unique names
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.components.is_empty() {
            return Err(UpdateError::ConfigError(
                "no components configured".to_string(),
            ));
        }
        deployment_order(&self.components)?;
        Ok(())
    }
}

/// Source control settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Remote to fetch from
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch to merge
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: default_branch(),
        }
    }
}

/// Health probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Seconds between probes
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,

    /// Total seconds a component is allowed to take to become healthy
    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,
}

fn default_health_interval() -> u64 {
    10
}

fn default_health_timeout() -> u64 {
    120
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
            timeout_secs: default_health_timeout(),
        }
    }
}

impl HealthSettings {
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            interval: Duration::from_secs(self.interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.retention_days, 7);
        assert_eq!(settings.health.interval_secs, 10);
        assert_eq!(settings.health.timeout_secs, 120);
        assert_eq!(settings.required_env, vec!["BOT_TOKEN"]);
        assert_eq!(settings.components.len(), 2);
        settings.validate().unwrap();
    }

    #[test]
    fn test_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.compose_file, settings.compose_file);
        assert_eq!(parsed.components.len(), settings.components.len());
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let parsed: Settings = serde_json::from_str(r#"{"retention_days": 3}"#).unwrap();
        assert_eq!(parsed.retention_days, 3);
        assert_eq!(parsed.compose_file, default_compose_file());
        assert_eq!(parsed.components.len(), 2);
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let mut settings = Settings::default();
        settings.components[0].depends_on = vec!["bot".to_string()];
        assert!(settings.validate().is_err());
    }
}
