//! Server state

use std::sync::Arc;

use crate::authn::credentials::CredentialStore;
use crate::deploy::orchestrator::DeploymentOrchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl ServerState {
    pub fn new(
        orchestrator: Arc<DeploymentOrchestrator>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            orchestrator,
            credentials,
        }
    }
}
