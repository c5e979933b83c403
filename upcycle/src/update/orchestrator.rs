//! Top-level update orchestration

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::backup::manager::BackupManager;
use crate::backup::Backup;
use crate::build::Builder;
use crate::errors::UpdateError;
use crate::health::{wait_healthy, HealthProbe, ProbeOptions};
use crate::models::component::{deployment_order, Component};
use crate::registry::ArtifactRegistry;
use crate::runtime::ComponentRuntime;
use crate::source::SourceSync;
use crate::storage::layout::StateLayout;
use crate::update::fsm::{UpdateEvent, UpdateFsm};
use crate::update::gate::OperatorGate;
use crate::update::lock::UpdateLock;
use crate::update::plan::{
    HealthCheckRecord, ProbeStage, UpdateOutcome, UpdatePlan, UpdateResult, UpdateScope,
};
use crate::verify::Verifier;

/// Drives one update transaction through its phases: preflight, backup,
/// sync, build, restart, health check, then commit or rollback.
pub struct UpdateOrchestrator {
    pub components: Vec<Component>,
    pub registry: Arc<dyn ArtifactRegistry>,
    pub runtime: Arc<dyn ComponentRuntime>,
    pub builder: Arc<dyn Builder>,
    pub source: Arc<dyn SourceSync>,
    pub probe: Arc<dyn HealthProbe>,
    pub verifier: Option<Arc<dyn Verifier>>,
    pub gate: Arc<dyn OperatorGate>,
    pub backups: BackupManager,
    pub layout: StateLayout,
    pub probe_options: ProbeOptions,
    pub required_env: Vec<String>,
    pub shutdown: broadcast::Sender<()>,
}

impl UpdateOrchestrator {
    /// Run one update transaction under the exclusive run lock
    pub async fn run_update(&self, plan: &UpdatePlan) -> Result<UpdateResult, UpdateError> {
        self.layout.setup().await?;
        let lock = UpdateLock::acquire(self.layout.lock_file()).await?;

        let result = self.run_locked(plan).await;

        if let Err(e) = lock.release().await {
            warn!("failed to release update lock: {}", e);
        }
        result
    }

    async fn run_locked(&self, plan: &UpdatePlan) -> Result<UpdateResult, UpdateError> {
        let mut fsm = UpdateFsm::new();
        let mut shutdown_rx = self.shutdown.subscribe();

        advance(&mut fsm, UpdateEvent::Begin)?;

        let scoped = self.scoped_components(plan)?;
        info!(
            "updating {} component(s): {}",
            scoped.len(),
            scoped
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        if let Err(e) = self.preflight(plan).await {
            let _ = fsm.process(UpdateEvent::Failed(e.to_string()));
            return Err(e);
        }
        advance(&mut fsm, UpdateEvent::PreconditionsOk)?;

        // An interrupt before the backup exists is a clean abort
        if interrupt_pending(&mut shutdown_rx) {
            let e = UpdateError::Interrupted("before backup, nothing to undo".to_string());
            let _ = fsm.process(UpdateEvent::Failed(e.to_string()));
            return Err(e);
        }

        let backup = match self.backups.snapshot(&scoped, Utc::now()).await {
            Ok(backup) => backup,
            Err(e) => {
                let _ = fsm.process(UpdateEvent::Failed(e.to_string()));
                return Err(e);
            }
        };
        advance(&mut fsm, UpdateEvent::BackupTaken)?;

        let mut health_checks = Vec::new();
        match self
            .mutate(plan, &scoped, &mut fsm, &mut health_checks, &mut shutdown_rx)
            .await
        {
            Ok(()) => {
                advance(&mut fsm, UpdateEvent::AllHealthy)?;
                advance(&mut fsm, UpdateEvent::Finish)?;
                info!("update committed, backup '{}' kept for the sweeper", backup.id());
                Ok(UpdateResult {
                    outcome: UpdateOutcome::Committed,
                    backup: Some(backup.id()),
                    health_checks,
                    rollback_reason: None,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                let _ = fsm.process(UpdateEvent::Failed(reason.clone()));
                warn!("update failed, rolling back to '{}': {}", backup.id(), reason);

                match self.rollback(&backup, &scoped, &mut health_checks).await {
                    Ok(()) => {
                        advance(&mut fsm, UpdateEvent::RollbackComplete)?;
                        info!("rollback complete, pre-update state restored");
                        Ok(UpdateResult {
                            outcome: UpdateOutcome::RolledBack,
                            backup: Some(backup.id()),
                            health_checks,
                            rollback_reason: Some(reason),
                        })
                    }
                    Err(rollback_err) => {
                        let terminal = UpdateError::RollbackFailed {
                            backup: backup.id(),
                            reason: format!("{} (while recovering from: {})", rollback_err, reason),
                        };
                        let _ = fsm.process(UpdateEvent::RollbackFailed(rollback_err.to_string()));
                        error!("{}", terminal);
                        Err(terminal)
                    }
                }
            }
        }
    }

    /// The in-scope components, dependency order, validated against the
    /// configured set
    fn scoped_components(&self, plan: &UpdatePlan) -> Result<Vec<Component>, UpdateError> {
        let ordered = deployment_order(&self.components)?;
        let scoped: Vec<Component> = ordered
            .into_iter()
            .filter(|c| plan.in_scope(&c.name))
            .cloned()
            .collect();

        if scoped.is_empty() {
            return Err(match &plan.scope {
                UpdateScope::Component(name) => {
                    UpdateError::ConfigError(format!("unknown component '{}'", name))
                }
                UpdateScope::All => {
                    UpdateError::ConfigError("no components configured".to_string())
                }
            });
        }
        Ok(scoped)
    }

    /// Side-effect-free checks; the only phase with nothing to undo
    async fn preflight(&self, plan: &UpdatePlan) -> Result<(), UpdateError> {
        if !self.registry.available().await {
            return Err(UpdateError::PreconditionError(
                "artifact registry is not responding".to_string(),
            ));
        }
        if !self.runtime.available().await {
            return Err(UpdateError::PreconditionError(
                "component runtime is not responding".to_string(),
            ));
        }
        if !self.source.available().await {
            return Err(UpdateError::PreconditionError(
                "source tree is not a usable checkout".to_string(),
            ));
        }

        for name in &self.required_env {
            let value = std::env::var(name)
                .map(SecretString::from)
                .unwrap_or_else(|_| SecretString::from(String::new()));
            if value.expose_secret().trim().is_empty() {
                // The value itself is never logged
                return Err(UpdateError::PreconditionError(format!(
                    "required environment variable '{}' is missing or empty",
                    name
                )));
            }
        }

        if plan.run_verification && self.verifier.is_none() {
            return Err(UpdateError::PreconditionError(
                "verification requested but no verify_command is configured".to_string(),
            ));
        }

        // Dirty-tree gate: the status read is side-effect-free, so a declined
        // gate aborts before any backup exists. The pull happens in Syncing.
        if let Some(changes) = self.source.local_changes().await? {
            warn!("uncommitted local changes detected:\n{}", changes);
            let prompt = format!(
                "Uncommitted local changes detected:\n{}\nProceed with the update anyway?",
                changes
            );
            if !self.gate.confirm(&prompt).await? {
                return Err(UpdateError::SourceConflictError(
                    "operator declined to proceed over local changes".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Sync, build, restart, and health-check. Any error here (including an
    /// interrupt) sends the run into rollback.
    async fn mutate(
        &self,
        plan: &UpdatePlan,
        scoped: &[Component],
        fsm: &mut UpdateFsm,
        health_checks: &mut Vec<HealthCheckRecord>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<(), UpdateError> {
        check_interrupt(shutdown_rx, "before sync")?;
        let sync = self.source.sync().await?;
        if sync.had_local_changes {
            warn!("syncing over operator-approved local changes");
        }
        advance(fsm, UpdateEvent::SyncComplete)?;

        check_interrupt(shutdown_rx, "before build")?;
        for component in scoped {
            let artifact = self.builder.build(component).await?;
            info!("built and published {} for '{}'", artifact, component.name);
        }
        advance(fsm, UpdateEvent::BuildComplete)?;

        check_interrupt(shutdown_rx, "before restart")?;
        // Stop dependents before their dependencies
        for component in scoped.iter().rev() {
            self.runtime.stop(component).await?;
        }
        // Start in dependency order; a component starts only after its
        // in-scope dependencies report healthy
        for component in scoped {
            for dep_name in &component.depends_on {
                let Some(dep) = scoped.iter().find(|c| &c.name == dep_name) else {
                    // Out-of-scope dependency kept running untouched
                    continue;
                };
                let report = wait_healthy(
                    self.probe.as_ref(),
                    &dep.health_endpoint,
                    &self.probe_options,
                    shutdown_rx,
                )
                .await;
                health_checks.push(HealthCheckRecord {
                    component: dep.name.clone(),
                    stage: ProbeStage::DependencyGate,
                    healthy: report.healthy,
                    attempts: report.attempts,
                });
                if report.interrupted {
                    return Err(UpdateError::Interrupted(format!(
                        "while waiting on dependency '{}'",
                        dep.name
                    )));
                }
                if !report.healthy {
                    return Err(UpdateError::HealthCheckFailed(format!(
                        "dependency '{}' never became healthy ({} attempt(s))",
                        dep.name, report.attempts
                    )));
                }
            }
            self.runtime.start(component).await?;
        }
        advance(fsm, UpdateEvent::RestartComplete)?;

        // The decisive pass: every restarted component, polled sequentially
        // so failure attribution stays unambiguous
        for component in scoped {
            let report = wait_healthy(
                self.probe.as_ref(),
                &component.health_endpoint,
                &self.probe_options,
                shutdown_rx,
            )
            .await;
            health_checks.push(HealthCheckRecord {
                component: component.name.clone(),
                stage: ProbeStage::PostUpdate,
                healthy: report.healthy,
                attempts: report.attempts,
            });
            if report.interrupted {
                return Err(UpdateError::Interrupted(format!(
                    "while health-checking '{}'",
                    component.name
                )));
            }
            if !report.healthy {
                return Err(UpdateError::HealthCheckFailed(format!(
                    "'{}' not healthy within the time budget ({} attempt(s))",
                    component.name, report.attempts
                )));
            }
        }

        if plan.run_verification {
            if let Some(verifier) = &self.verifier {
                verifier.verify().await?;
            }
        }

        Ok(())
    }

    /// Restore the pre-update state. Best-effort in the sense that it does
    /// not retry indefinitely, and no longer observes interrupts: once
    /// entered, it runs to a deterministic end.
    async fn rollback(
        &self,
        backup: &Backup,
        scoped: &[Component],
        health_checks: &mut Vec<HealthCheckRecord>,
    ) -> Result<(), UpdateError> {
        // Keep the sender alive so the quiet receiver never reads "closed"
        let (_keepalive, mut quiet_rx) = broadcast::channel::<()>(1);

        for component in scoped.iter().rev() {
            self.runtime.stop(component).await?;
        }

        self.backups.restore(backup).await?;

        // Restart components that had a prior artifact; entries restored to
        // "absent" stay stopped. One sanity pass per restarted component.
        for component in scoped {
            let had_prior = backup
                .entry(&component.name)
                .map(|e| e.image_id.is_some())
                .unwrap_or(false);
            if !had_prior {
                info!("'{}' had no pre-update artifact, leaving it stopped", component.name);
                continue;
            }

            self.runtime.start(component).await?;

            let report = wait_healthy(
                self.probe.as_ref(),
                &component.health_endpoint,
                &self.probe_options,
                &mut quiet_rx,
            )
            .await;
            health_checks.push(HealthCheckRecord {
                component: component.name.clone(),
                stage: ProbeStage::Rollback,
                healthy: report.healthy,
                attempts: report.attempts,
            });
            if !report.healthy {
                return Err(UpdateError::HealthCheckFailed(format!(
                    "'{}' unhealthy after restore ({} attempt(s))",
                    component.name, report.attempts
                )));
            }
        }

        Ok(())
    }
}

/// Transitions driven here are valid by construction; a rejection is a bug
fn advance(fsm: &mut UpdateFsm, event: UpdateEvent) -> Result<(), UpdateError> {
    fsm.process(event).map_err(UpdateError::Internal)
}

fn interrupt_pending(rx: &mut broadcast::Receiver<()>) -> bool {
    matches!(
        rx.try_recv(),
        Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_))
    )
}

fn check_interrupt(rx: &mut broadcast::Receiver<()>, when: &str) -> Result<(), UpdateError> {
    if interrupt_pending(rx) {
        Err(UpdateError::Interrupted(when.to_string()))
    } else {
        Ok(())
    }
}
