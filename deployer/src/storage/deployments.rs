//! Deployment persistence
//!
//! Records are append-only: once written, a deployment is never removed.
//! The only mutation allowed afterwards is a monotonic status update.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::models::deployment::{Deployment, DeploymentStatus};

/// Deployment store trait for testability
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Append a new deployment record
    async fn record(&self, deployment: Deployment) -> Result<(), DeployError>;

    /// Get a deployment by id
    async fn get(&self, id: &str) -> Result<Option<Deployment>, DeployError>;

    /// All deployments of an owner, newest first
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Deployment>, DeployError>;

    /// Deployments still waiting for the hosting platform, oldest first
    async fn list_building(&self) -> Result<Vec<Deployment>, DeployError>;

    /// Apply an observed status, refusing to leave a terminal state
    async fn update_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        site_url: Option<String>,
    ) -> Result<Deployment, DeployError>;
}

/// Deployment store holding records in memory, optionally mirrored to a JSON file
pub struct LocalDeploymentStore {
    file: Option<File>,
    records: RwLock<Vec<Deployment>>,
}

impl LocalDeploymentStore {
    /// Create an in-memory store
    pub fn in_memory() -> Self {
        Self {
            file: None,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Open a file backed store, loading existing records
    pub async fn open(file: File) -> Result<Self, DeployError> {
        let records: Vec<Deployment> = file
            .read_json_or_default()
            .await
            .map_err(|e| DeployError::Storage(format!("failed to read deployments: {}", e)))?;

        info!(
            "Loaded {} deployment(s) from {}",
            records.len(),
            file.path().display()
        );

        Ok(Self {
            file: Some(file),
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &[Deployment]) -> Result<(), DeployError> {
        if let Some(file) = &self.file {
            file.write_json(&records)
                .await
                .map_err(|e| DeployError::Storage(format!("failed to write deployments: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentStore for LocalDeploymentStore {
    async fn record(&self, deployment: Deployment) -> Result<(), DeployError> {
        let mut records = self.records.write().await;
        if records.iter().any(|d| d.id == deployment.id) {
            return Err(DeployError::Storage(format!(
                "deployment {} already recorded",
                deployment.id
            )));
        }

        debug!(
            "Recording deployment {} ({}) for {}",
            deployment.id, deployment.status, deployment.owner_id
        );
        records.push(deployment);

        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Deployment>, DeployError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|d| d.id == id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Deployment>, DeployError> {
        let records = self.records.read().await;
        let mut owned: Vec<Deployment> = records
            .iter()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn list_building(&self) -> Result<Vec<Deployment>, DeployError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|d| d.status == DeploymentStatus::Building)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        site_url: Option<String>,
    ) -> Result<Deployment, DeployError> {
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| DeployError::NotFound(format!("deployment {}", id)))?;

        let previous = records[index].clone();
        if !records[index].apply_status(status, site_url) {
            return Err(DeployError::Storage(format!(
                "deployment {} cannot move from {} to {}",
                id, previous.status, status
            )));
        }

        if let Err(e) = self.persist(&records).await {
            records[index] = previous;
            return Err(e);
        }
        Ok(records[index].clone())
    }
}
