//! Deployable components and their dependency ordering

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::UpdateError;

/// One independently deployable service unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Scope key used on the command line (`bot`, `llm`)
    pub name: String,

    /// Compose service the runtime starts and stops
    pub service: String,

    /// Image repository whose `latest`/backup tags the orchestrator manages
    pub image: String,

    /// Readiness endpoint polled after a restart
    pub health_endpoint: Url,

    /// Components that must be started and healthy before this one starts
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Order components so every dependency precedes its dependents.
///
/// Rejects duplicate names, references to unknown components, and cycles.
pub fn deployment_order(components: &[Component]) -> Result<Vec<&Component>, UpdateError> {
    let mut seen = std::collections::HashSet::new();
    for component in components {
        if !seen.insert(component.name.as_str()) {
            return Err(UpdateError::ConfigError(format!(
                "duplicate component name '{}'",
                component.name
            )));
        }
    }

    for component in components {
        for dep in &component.depends_on {
            if !seen.contains(dep.as_str()) {
                return Err(UpdateError::ConfigError(format!(
                    "component '{}' depends on unknown component '{}'",
                    component.name, dep
                )));
            }
        }
    }

    // Kahn's algorithm, stable with respect to the configured order
    let mut ordered: Vec<&Component> = Vec::with_capacity(components.len());
    let mut placed = std::collections::HashSet::new();

    while ordered.len() < components.len() {
        let mut progressed = false;
        for component in components {
            if placed.contains(component.name.as_str()) {
                continue;
            }
            if component
                .depends_on
                .iter()
                .all(|dep| placed.contains(dep.as_str()))
            {
                placed.insert(component.name.as_str());
                ordered.push(component);
                progressed = true;
            }
        }
        if !progressed {
            let stuck: Vec<&str> = components
                .iter()
                .filter(|c| !placed.contains(c.name.as_str()))
                .map(|c| c.name.as_str())
                .collect();
            return Err(UpdateError::ConfigError(format!(
                "dependency cycle among components: {}",
                stuck.join(", ")
            )));
        }
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, deps: &[&str]) -> Component {
        Component {
            name: name.to_string(),
            service: name.to_string(),
            image: format!("test/{}", name),
            health_endpoint: Url::parse("http://localhost:9000/health").unwrap(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_dependencies_come_first() {
        let components = vec![component("bot", &["llm"]), component("llm", &[])];
        let ordered = deployment_order(&components).unwrap();
        let names: Vec<&str> = ordered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["llm", "bot"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let components = vec![component("bot", &[]), component("bot", &[])];
        assert!(matches!(
            deployment_order(&components),
            Err(UpdateError::ConfigError(_))
        ));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let components = vec![component("bot", &["ghost"])];
        assert!(matches!(
            deployment_order(&components),
            Err(UpdateError::ConfigError(_))
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let components = vec![component("a", &["b"]), component("b", &["a"])];
        assert!(matches!(
            deployment_order(&components),
            Err(UpdateError::ConfigError(_))
        ));
    }
}
