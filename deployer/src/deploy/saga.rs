//! Step log and compensation table for multi-platform provisioning
//!
//! Every completed step registers the action that undoes it. On failure the
//! registered actions run newest first; each outcome is kept in the log so
//! callers can tell which resources were left behind.

use std::fmt;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::DeployError;

/// Provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaStep {
    CreateRepository,
    CreateSite,
}

/// Action undoing a completed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    DeleteRepository { name: String },
    DeleteSite { service_id: String },
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::DeleteRepository { name } => write!(f, "delete repository {}", name),
            Compensation::DeleteSite { service_id } => write!(f, "delete site {}", service_id),
        }
    }
}

/// Runs compensating actions against the real platforms
#[async_trait]
pub trait Compensator: Send + Sync {
    async fn compensate(&self, action: &Compensation) -> Result<(), DeployError>;
}

/// Outcome of a step as recorded in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed(String),
    Compensated,
    CompensationFailed(String),
}

/// Log entry
#[derive(Debug, Clone)]
pub struct StepEntry {
    pub step: SagaStep,
    pub outcome: StepOutcome,
    pub compensation: Option<Compensation>,
}

/// Result of running the compensation table
#[derive(Debug, Default)]
pub struct CompensationReport {
    pub compensated: Vec<Compensation>,
    pub failed: Vec<(Compensation, String)>,
}

impl CompensationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered step log
#[derive(Debug, Default)]
pub struct Saga {
    log: Vec<StepEntry>,
}

impl Saga {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &[StepEntry] {
        &self.log
    }

    /// Record a completed step and the action that undoes it
    pub fn completed(&mut self, step: SagaStep, compensation: Compensation) {
        self.log.push(StepEntry {
            step,
            outcome: StepOutcome::Completed,
            compensation: Some(compensation),
        });
    }

    /// Record a failed step. Failed steps have nothing to undo.
    pub fn failed(&mut self, step: SagaStep, error: &DeployError) {
        self.log.push(StepEntry {
            step,
            outcome: StepOutcome::Failed(error.to_string()),
            compensation: None,
        });
    }

    /// Undo every completed step, newest first. Keeps going past failures.
    pub async fn compensate(&mut self, compensator: &dyn Compensator) -> CompensationReport {
        let mut report = CompensationReport::default();

        for entry in self.log.iter_mut().rev() {
            if entry.outcome != StepOutcome::Completed {
                continue;
            }
            let Some(action) = entry.compensation.clone() else {
                continue;
            };

            info!("Compensating {:?}: {}", entry.step, action);
            match compensator.compensate(&action).await {
                Ok(()) => {
                    entry.outcome = StepOutcome::Compensated;
                    report.compensated.push(action);
                }
                Err(e) => {
                    warn!("Compensation '{}' failed: {}", action, e);
                    entry.outcome = StepOutcome::CompensationFailed(e.to_string());
                    report.failed.push((action, e.to_string()));
                }
            }
        }

        report
    }
}
