//! Update plans and results

use serde::{Deserialize, Serialize};

use crate::errors::UpdateError;

/// Which components an update covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateScope {
    All,
    Component(String),
}

/// The requested scope of one update run; constructed once per invocation,
/// immutable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub scope: UpdateScope,

    /// Run the post-update verification command after health checks pass
    pub run_verification: bool,
}

impl UpdatePlan {
    /// Parse a scope word: `all`, `full-test`, or `<name>-only`
    pub fn parse(word: &str) -> Result<Self, UpdateError> {
        match word {
            "all" => Ok(Self {
                scope: UpdateScope::All,
                run_verification: false,
            }),
            "full-test" => Ok(Self {
                scope: UpdateScope::All,
                run_verification: true,
            }),
            other => match other.strip_suffix("-only") {
                Some(name) if !name.is_empty() => Ok(Self {
                    scope: UpdateScope::Component(name.to_string()),
                    run_verification: false,
                }),
                _ => Err(UpdateError::ConfigError(format!(
                    "unknown scope '{}' (expected 'all', 'full-test', or '<component>-only')",
                    other
                ))),
            },
        }
    }

    pub fn in_scope(&self, component: &str) -> bool {
        match &self.scope {
            UpdateScope::All => true,
            UpdateScope::Component(name) => name == component,
        }
    }
}

/// How one orchestration run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateOutcome {
    Committed,
    RolledBack,
}

/// Which pass of the run a health check belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeStage {
    /// Waiting on a dependency before starting its dependent
    DependencyGate,

    /// The decisive pass after all restarts
    PostUpdate,

    /// Sanity pass after a rollback
    Rollback,
}

/// One wait-for-healthy cycle in the run's record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckRecord {
    pub component: String,
    pub stage: ProbeStage,
    pub healthy: bool,
    pub attempts: u32,
}

/// Outcome of one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResult {
    pub outcome: UpdateOutcome,

    /// Backup taken for this run, if one was created
    pub backup: Option<String>,

    /// Every health-check cycle, in order
    pub health_checks: Vec<HealthCheckRecord>,

    /// Why the run rolled back, when it did
    pub rollback_reason: Option<String>,
}
