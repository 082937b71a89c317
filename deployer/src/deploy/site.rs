//! Static site provisioning on the hosting platform

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use openapi_client::models::{CreateServiceRequest, StaticSiteDetails};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::http::client::{ApiError, HttpClient};
use crate::models::deployment::DeploymentStatus;
use crate::utils::token_fingerprint;

/// Site creation input
#[derive(Debug, Clone)]
pub struct SiteRequest<'a> {
    pub name: &'a str,
    pub repo_url: &'a str,
    /// Branch the content was pushed to
    pub branch: &'a str,
    pub api_key: &'a SecretString,
}

/// Hosting service created for a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSite {
    pub service_id: String,
    pub status: DeploymentStatus,
}

/// Current state of a hosting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatus {
    pub status: DeploymentStatus,
    pub url: Option<String>,
}

/// Site provisioner trait for testability
#[async_trait]
pub trait SiteProvisioner: Send + Sync {
    /// Create a static site service bound to a repository
    async fn create(&self, request: SiteRequest<'_>) -> Result<CreatedSite, DeployError>;

    /// Look up the latest deploy of a service
    async fn get_status(
        &self,
        service_id: &str,
        api_key: &SecretString,
    ) -> Result<SiteStatus, DeployError>;

    /// Delete a service. Deleting a missing service succeeds.
    async fn delete(&self, service_id: &str, api_key: &SecretString) -> Result<(), DeployError>;
}

/// Translate the hosting platform's deploy status into a deployment status.
///
/// Total: unknown values are treated as still building.
pub fn map_deploy_status(status: &str) -> DeploymentStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "live" => DeploymentStatus::Live,
        "build_failed" | "update_failed" | "pre_deploy_failed" | "canceled" => {
            DeploymentStatus::Failed
        }
        "created"
        | "queued"
        | "build_in_progress"
        | "update_in_progress"
        | "pre_deploy_in_progress"
        | "deactivated" => DeploymentStatus::Building,
        other => {
            debug!("Unrecognized deploy status '{}', treating as building", other);
            DeploymentStatus::Building
        }
    }
}

/// Static site settings
#[derive(Debug, Clone)]
pub struct SiteOptions {
    pub branch: String,
    pub publish_path: String,
    pub build_command: String,
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            publish_path: "./".to_string(),
            build_command: String::new(),
        }
    }
}

/// Render backed site provisioner
pub struct RenderProvisioner {
    client: HttpClient,
    options: SiteOptions,
    owners: RwLock<HashMap<String, String>>,
}

impl RenderProvisioner {
    pub fn new(client: HttpClient, options: SiteOptions) -> Self {
        Self {
            client,
            options,
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the owner id of the API key, cached per key fingerprint
    async fn owner_id(&self, api_key: &SecretString) -> Result<String, ApiError> {
        let fingerprint = token_fingerprint(api_key);
        {
            let owners = self.owners.read().unwrap_or_else(|e| e.into_inner());
            if let Some(owner_id) = owners.get(&fingerprint) {
                return Ok(owner_id.clone());
            }
        }

        let entries = self.client.list_owners(api_key.expose_secret(), 1).await?;
        let owner_id = entries
            .into_iter()
            .next()
            .map(|entry| entry.owner.id)
            .ok_or_else(|| ApiError {
                status: None,
                message: "no owner is associated with the API key".to_string(),
            })?;
        debug!("Resolved hosting owner {}", owner_id);

        let mut owners = self.owners.write().unwrap_or_else(|e| e.into_inner());
        owners.insert(fingerprint, owner_id.clone());
        Ok(owner_id)
    }
}

#[async_trait]
impl SiteProvisioner for RenderProvisioner {
    async fn create(&self, request: SiteRequest<'_>) -> Result<CreatedSite, DeployError> {
        info!("Creating static site {} from {}", request.name, request.repo_url);

        let owner_id = self
            .owner_id(request.api_key)
            .await
            .map_err(|e| DeployError::SiteCreation(format!("owner lookup failed: {}", e)))?;

        let body = CreateServiceRequest {
            service_type: "static_site".to_string(),
            name: request.name.to_string(),
            owner_id,
            repo: request.repo_url.to_string(),
            branch: if request.branch.is_empty() {
                self.options.branch.clone()
            } else {
                request.branch.to_string()
            },
            auto_deploy: "yes".to_string(),
            service_details: StaticSiteDetails {
                publish_path: self.options.publish_path.clone(),
                build_command: self.options.build_command.clone(),
            },
        };

        let response = self
            .client
            .create_service(request.api_key.expose_secret(), &body)
            .await
            .map_err(|e| DeployError::SiteCreation(e.to_string()))?;

        info!("Static site {} created as {}", request.name, response.service.id);

        Ok(CreatedSite {
            service_id: response.service.id,
            status: DeploymentStatus::Building,
        })
    }

    async fn get_status(
        &self,
        service_id: &str,
        api_key: &SecretString,
    ) -> Result<SiteStatus, DeployError> {
        let service = self
            .client
            .get_service(api_key.expose_secret(), service_id)
            .await
            .map_err(|e| DeployError::SiteStatus(e.to_string()))?;
        let deploys = self
            .client
            .list_deploys(api_key.expose_secret(), service_id, 1)
            .await
            .map_err(|e| DeployError::SiteStatus(e.to_string()))?;

        let status = deploys
            .first()
            .map(|entry| map_deploy_status(&entry.deploy.status))
            .unwrap_or(DeploymentStatus::Building);

        Ok(SiteStatus {
            status,
            url: service.service_details.and_then(|d| d.url),
        })
    }

    async fn delete(&self, service_id: &str, api_key: &SecretString) -> Result<(), DeployError> {
        match self
            .client
            .delete_service(api_key.expose_secret(), service_id)
            .await
        {
            Ok(()) => {
                info!("Static site {} deleted", service_id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("Static site {} already absent", service_id);
                Ok(())
            }
            Err(e) => Err(DeployError::SiteDeletion(e.to_string())),
        }
    }
}
