//! Finite state machine for the update transaction

use serde::{Deserialize, Serialize};

/// Phase of one update run; the single authoritative state field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdatePhase {
    Idle,
    CheckingPreconditions,
    BackingUp,
    Syncing,
    Building,
    Restarting,
    HealthChecking,
    Committed,
    RollingBack,
    Done,
}

/// Event driving a phase transition
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// Begin the run
    Begin,

    /// All preconditions hold
    PreconditionsOk,

    /// Backup created for every in-scope component
    BackupTaken,

    /// Source fetched and merged
    SyncComplete,

    /// All in-scope artifacts built and published
    BuildComplete,

    /// All in-scope components restarted
    RestartComplete,

    /// Every restarted component healthy (and verification passed if requested)
    AllHealthy,

    /// The current phase failed
    Failed(String),

    /// Rollback restored the pre-update state
    RollbackComplete,

    /// Rollback itself failed; terminal, operator intervention required
    RollbackFailed(String),

    /// Close out a committed run
    Finish,
}

/// Update FSM.
///
/// Failures before a backup exists (preconditions, the backup step itself)
/// go straight to `Done` as a clean abort; failures after go through
/// `RollingBack`.
#[derive(Debug, Clone)]
pub struct UpdateFsm {
    phase: UpdatePhase,
    error: Option<String>,
}

impl UpdateFsm {
    /// Create a new FSM in the idle phase
    pub fn new() -> Self {
        Self {
            phase: UpdatePhase::Idle,
            error: None,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> &UpdatePhase {
        &self.phase
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition phase
    pub fn process(&mut self, event: UpdateEvent) -> Result<(), String> {
        let new_phase = match (&self.phase, &event) {
            (UpdatePhase::Idle, UpdateEvent::Begin) => UpdatePhase::CheckingPreconditions,

            (UpdatePhase::CheckingPreconditions, UpdateEvent::PreconditionsOk) => {
                UpdatePhase::BackingUp
            }
            // No state was mutated yet: abort cleanly
            (UpdatePhase::CheckingPreconditions, UpdateEvent::Failed(err)) => {
                self.error = Some(err.clone());
                UpdatePhase::Done
            }

            (UpdatePhase::BackingUp, UpdateEvent::BackupTaken) => UpdatePhase::Syncing,
            // All-or-nothing backup: partial tags were already removed
            (UpdatePhase::BackingUp, UpdateEvent::Failed(err)) => {
                self.error = Some(err.clone());
                UpdatePhase::Done
            }

            (UpdatePhase::Syncing, UpdateEvent::SyncComplete) => UpdatePhase::Building,
            (UpdatePhase::Building, UpdateEvent::BuildComplete) => UpdatePhase::Restarting,
            (UpdatePhase::Restarting, UpdateEvent::RestartComplete) => UpdatePhase::HealthChecking,
            (UpdatePhase::HealthChecking, UpdateEvent::AllHealthy) => UpdatePhase::Committed,

            // A backup exists: every failure from here rolls back
            (
                UpdatePhase::Syncing
                | UpdatePhase::Building
                | UpdatePhase::Restarting
                | UpdatePhase::HealthChecking,
                UpdateEvent::Failed(err),
            ) => {
                self.error = Some(err.clone());
                UpdatePhase::RollingBack
            }

            (UpdatePhase::Committed, UpdateEvent::Finish) => UpdatePhase::Done,
            (UpdatePhase::RollingBack, UpdateEvent::RollbackComplete) => UpdatePhase::Done,
            (UpdatePhase::RollingBack, UpdateEvent::RollbackFailed(err)) => {
                self.error = Some(err.clone());
                UpdatePhase::Done
            }

            // Invalid transitions
            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = new_phase;
        Ok(())
    }
}

impl Default for UpdateFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase() {
        let fsm = UpdateFsm::new();
        assert_eq!(fsm.phase(), &UpdatePhase::Idle);
        assert!(fsm.error().is_none());
    }

    #[test]
    fn test_committed_flow() {
        let mut fsm = UpdateFsm::new();

        fsm.process(UpdateEvent::Begin).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::CheckingPreconditions);

        fsm.process(UpdateEvent::PreconditionsOk).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::BackingUp);

        fsm.process(UpdateEvent::BackupTaken).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::Syncing);

        fsm.process(UpdateEvent::SyncComplete).unwrap();
        fsm.process(UpdateEvent::BuildComplete).unwrap();
        fsm.process(UpdateEvent::RestartComplete).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::HealthChecking);

        fsm.process(UpdateEvent::AllHealthy).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::Committed);

        fsm.process(UpdateEvent::Finish).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::Done);
        assert!(fsm.error().is_none());
    }

    #[test]
    fn test_rollback_flow() {
        let mut fsm = UpdateFsm::new();

        fsm.process(UpdateEvent::Begin).unwrap();
        fsm.process(UpdateEvent::PreconditionsOk).unwrap();
        fsm.process(UpdateEvent::BackupTaken).unwrap();
        fsm.process(UpdateEvent::SyncComplete).unwrap();
        fsm.process(UpdateEvent::BuildComplete).unwrap();
        fsm.process(UpdateEvent::RestartComplete).unwrap();

        fsm.process(UpdateEvent::Failed("bot never became healthy".to_string()))
            .unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::RollingBack);
        assert_eq!(fsm.error(), Some("bot never became healthy"));

        fsm.process(UpdateEvent::RollbackComplete).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::Done);
    }

    #[test]
    fn test_precondition_failure_aborts_cleanly() {
        let mut fsm = UpdateFsm::new();

        fsm.process(UpdateEvent::Begin).unwrap();
        fsm.process(UpdateEvent::Failed("docker unavailable".to_string()))
            .unwrap();

        // Straight to Done, never through RollingBack
        assert_eq!(fsm.phase(), &UpdatePhase::Done);
        assert_eq!(fsm.error(), Some("docker unavailable"));
    }

    #[test]
    fn test_rollback_failure_is_terminal() {
        let mut fsm = UpdateFsm::new();

        fsm.process(UpdateEvent::Begin).unwrap();
        fsm.process(UpdateEvent::PreconditionsOk).unwrap();
        fsm.process(UpdateEvent::BackupTaken).unwrap();
        fsm.process(UpdateEvent::Failed("merge failed".to_string())).unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::RollingBack);

        fsm.process(UpdateEvent::RollbackFailed("registry down".to_string()))
            .unwrap();
        assert_eq!(fsm.phase(), &UpdatePhase::Done);
        assert_eq!(fsm.error(), Some("registry down"));
    }

    #[test]
    fn test_invalid_transition() {
        let mut fsm = UpdateFsm::new();

        // Cannot report health from Idle
        assert!(fsm.process(UpdateEvent::AllHealthy).is_err());
        assert_eq!(fsm.phase(), &UpdatePhase::Idle);
    }
}
