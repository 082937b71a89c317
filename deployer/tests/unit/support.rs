//! Shared fakes for the platform, storage and credential seams

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use deployer::authn::credentials::{CredentialStore, CredentialsUpdate, EncryptedCredentialStore};
use deployer::authn::encryption::CredentialKey;
use deployer::deploy::orchestrator::{DeploymentOrchestrator, OrchestratorOptions};
use deployer::deploy::repository::{CreatedRepository, RepositoryProvisioner};
use deployer::deploy::site::{CreatedSite, SiteProvisioner, SiteRequest, SiteStatus};
use deployer::errors::DeployError;
use deployer::models::deployment::{Deployment, DeploymentStatus};
use deployer::ratelimit::{RateLimitOptions, RateLimiter};
use deployer::storage::deployments::{DeploymentStore, LocalDeploymentStore};
use openapi_server::models::DeployRequest;

pub const ALICE: &str = "alice";

#[derive(Default)]
pub struct FakeRepos {
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub create_error: Mutex<Option<DeployError>>,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl RepositoryProvisioner for FakeRepos {
    async fn create(
        &self,
        name: &str,
        _content: &str,
        _token: &SecretString,
    ) -> Result<CreatedRepository, DeployError> {
        self.created.lock().unwrap().push(name.to_string());
        if let Some(err) = self.create_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(CreatedRepository {
            repo_url: format!("https://github.com/octo/{}", name),
            public_content_url: format!(
                "https://raw.githubusercontent.com/octo/{}/main/index.html",
                name
            ),
            branch: "main".to_string(),
        })
    }

    async fn delete(&self, name: &str, _token: &SecretString) -> Result<(), DeployError> {
        self.deleted.lock().unwrap().push(name.to_string());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(DeployError::RepoDeletion("503 - unavailable".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSites {
    pub created: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub create_error: Mutex<Option<DeployError>>,
    pub create_delay: Mutex<Option<Duration>>,
    pub statuses: Mutex<HashMap<String, SiteStatus>>,
    pub status_calls: AtomicUsize,
}

#[async_trait]
impl SiteProvisioner for FakeSites {
    async fn create(&self, request: SiteRequest<'_>) -> Result<CreatedSite, DeployError> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.created
            .lock()
            .unwrap()
            .push((request.name.to_string(), request.repo_url.to_string()));
        if let Some(err) = self.create_error.lock().unwrap().take() {
            return Err(err);
        }
        let count = self.created.lock().unwrap().len();
        Ok(CreatedSite {
            service_id: format!("srv-{}", count),
            status: DeploymentStatus::Building,
        })
    }

    async fn get_status(
        &self,
        service_id: &str,
        _api_key: &SecretString,
    ) -> Result<SiteStatus, DeployError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .get(service_id)
            .cloned()
            .ok_or_else(|| DeployError::SiteStatus(format!("404 - {} not found", service_id)))
    }

    async fn delete(&self, service_id: &str, _api_key: &SecretString) -> Result<(), DeployError> {
        self.deleted.lock().unwrap().push(service_id.to_string());
        Ok(())
    }
}

/// Store that refuses every write
#[derive(Default)]
pub struct ReadOnlyStore;

#[async_trait]
impl DeploymentStore for ReadOnlyStore {
    async fn record(&self, _deployment: Deployment) -> Result<(), DeployError> {
        Err(DeployError::Storage("disk full".to_string()))
    }

    async fn get(&self, _id: &str) -> Result<Option<Deployment>, DeployError> {
        Ok(None)
    }

    async fn list_by_owner(&self, _owner_id: &str) -> Result<Vec<Deployment>, DeployError> {
        Ok(Vec::new())
    }

    async fn list_building(&self) -> Result<Vec<Deployment>, DeployError> {
        Ok(Vec::new())
    }

    async fn update_status(
        &self,
        id: &str,
        _status: DeploymentStatus,
        _site_url: Option<String>,
    ) -> Result<Deployment, DeployError> {
        Err(DeployError::NotFound(id.to_string()))
    }
}

pub struct Harness {
    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub repos: Arc<FakeRepos>,
    pub sites: Arc<FakeSites>,
    pub store: Arc<dyn DeploymentStore>,
    pub credentials: Arc<EncryptedCredentialStore>,
}

impl Harness {
    /// Orchestrator over fakes, with both tokens configured for [`ALICE`]
    pub async fn new() -> Self {
        Self::with_store(Arc::new(LocalDeploymentStore::in_memory())).await
    }

    pub async fn with_store(store: Arc<dyn DeploymentStore>) -> Self {
        Self::with_platforms(store, Arc::new(FakeSites::default())).await
    }

    pub async fn with_platforms(store: Arc<dyn DeploymentStore>, sites: Arc<FakeSites>) -> Self {
        let repos = Arc::new(FakeRepos::default());
        let credentials = Arc::new(EncryptedCredentialStore::in_memory(CredentialKey::generate()));
        credentials
            .upsert(
                ALICE,
                CredentialsUpdate {
                    github_token: Some(SecretString::from("ghp_test".to_string())),
                    render_api_key: Some(SecretString::from("rnd_test".to_string())),
                },
            )
            .await
            .unwrap();

        let orchestrator = Arc::new(DeploymentOrchestrator::new(
            OrchestratorOptions::default(),
            Arc::new(RateLimiter::new(RateLimitOptions::default())),
            credentials.clone(),
            repos.clone(),
            sites.clone(),
            store.clone(),
        ));

        Self {
            orchestrator,
            repos,
            sites,
            store,
            credentials,
        }
    }

    pub async fn records(&self, owner: &str) -> Vec<Deployment> {
        self.store.list_by_owner(owner).await.unwrap()
    }
}

pub fn request(service_name: &str) -> DeployRequest {
    DeployRequest {
        content: "<html><body><h1>Hello</h1></body></html>".to_string(),
        service_name: service_name.to_string(),
        page_id: Some("page-1".to_string()),
        template_type: Some("landing".to_string()),
        prompt: None,
    }
}
