//! Finite State Machine for a single deployment attempt

use serde::{Deserialize, Serialize};

use crate::models::deployment::DeploymentStatus;

/// Provisioning state of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    /// Request validated and admitted, nothing created yet
    Requested,

    /// Repository exists and holds the content
    RepoCreated,

    /// Hosting service exists, waiting for its first deploy to go live
    SiteCreated,

    /// Site creation failed, compensations are running
    RollingBack,

    /// Repository creation failed, nothing to undo
    RepoCreateFailed,

    /// Site creation failed and the repository was deleted
    SiteCreateFailedRolledBack,

    /// Site creation failed and the repository could not be deleted
    SiteCreateFailedRollbackFailed,
}

impl SagaState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::SiteCreated
                | SagaState::RepoCreateFailed
                | SagaState::SiteCreateFailedRolledBack
                | SagaState::SiteCreateFailedRollbackFailed
        )
    }

    /// Status to persist once the run has reached a terminal state
    pub fn outcome_status(&self) -> Option<DeploymentStatus> {
        match self {
            SagaState::SiteCreated => Some(DeploymentStatus::Building),
            SagaState::RepoCreateFailed
            | SagaState::SiteCreateFailedRolledBack
            | SagaState::SiteCreateFailedRollbackFailed => Some(DeploymentStatus::Failed),
            _ => None,
        }
    }
}

/// Saga event
#[derive(Debug, Clone)]
pub enum SagaEvent {
    RepoCreated,
    RepoCreateFailed(String),
    SiteCreated,
    SiteCreateFailed(String),
    RollbackSucceeded,
    RollbackFailed(String),
}

/// Deployment saga FSM
#[derive(Debug, Clone)]
pub struct SagaFsm {
    state: SagaState,
    error: Option<String>,
    rollback_error: Option<String>,
}

impl SagaFsm {
    /// Create a new FSM in requested state
    pub fn new() -> Self {
        Self {
            state: SagaState::Requested,
            error: None,
            rollback_error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> SagaState {
        self.state
    }

    /// The error that failed the run, if any. Rollback problems never replace it.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn rollback_error(&self) -> Option<&str> {
        self.rollback_error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SagaEvent) -> Result<SagaState, String> {
        let new_state = match (self.state, &event) {
            (SagaState::Requested, SagaEvent::RepoCreated) => SagaState::RepoCreated,
            (SagaState::Requested, SagaEvent::RepoCreateFailed(err)) => {
                self.error = Some(err.clone());
                SagaState::RepoCreateFailed
            }

            (SagaState::RepoCreated, SagaEvent::SiteCreated) => SagaState::SiteCreated,
            (SagaState::RepoCreated, SagaEvent::SiteCreateFailed(err)) => {
                self.error = Some(err.clone());
                SagaState::RollingBack
            }

            (SagaState::RollingBack, SagaEvent::RollbackSucceeded) => {
                SagaState::SiteCreateFailedRolledBack
            }
            (SagaState::RollingBack, SagaEvent::RollbackFailed(err)) => {
                self.rollback_error = Some(err.clone());
                SagaState::SiteCreateFailedRollbackFailed
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for SagaFsm {
    fn default() -> Self {
        Self::new()
    }
}
