//! Deployment orchestration across the source-control host and the hosting platform

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use openapi_server::models::DeployRequest;
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::authn::credentials::{CredentialStore, PlatformCredentials};
use crate::deploy::fsm::{SagaEvent, SagaFsm};
use crate::deploy::naming::{compose_repo_name, normalize_service_name};
use crate::deploy::repository::RepositoryProvisioner;
use crate::deploy::saga::{Compensation, CompensationReport, Compensator, Saga, SagaStep};
use crate::deploy::site::{SiteProvisioner, SiteRequest};
use crate::errors::DeployError;
use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::ratelimit::RateLimiter;
use crate::storage::deployments::DeploymentStore;
use crate::utils::generate_uuid;

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Prefix of every composed repository name
    pub repo_prefix: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            repo_prefix: "site".to_string(),
        }
    }
}

/// Coordinates one deployment across both platforms and records its outcome
pub struct DeploymentOrchestrator {
    options: OrchestratorOptions,
    rate_limiter: Arc<RateLimiter>,
    credentials: Arc<dyn CredentialStore>,
    repos: Arc<dyn RepositoryProvisioner>,
    sites: Arc<dyn SiteProvisioner>,
    store: Arc<dyn DeploymentStore>,
}

/// Request fields that end up in the persisted record
struct Attempt<'a> {
    id: String,
    owner_id: &'a str,
    service_name: String,
    repo_name: String,
    request: &'a DeployRequest,
}

impl DeploymentOrchestrator {
    pub fn new(
        options: OrchestratorOptions,
        rate_limiter: Arc<RateLimiter>,
        credentials: Arc<dyn CredentialStore>,
        repos: Arc<dyn RepositoryProvisioner>,
        sites: Arc<dyn SiteProvisioner>,
        store: Arc<dyn DeploymentStore>,
    ) -> Self {
        Self {
            options,
            rate_limiter,
            credentials,
            repos,
            sites,
            store,
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Provision a repository and a static site for `request`.
    ///
    /// Validation, rate limiting and missing credentials fail before any
    /// external call and leave nothing behind. Every attempt that reaches
    /// repository creation persists exactly one deployment record.
    pub async fn deploy(
        &self,
        identity: &str,
        request: &DeployRequest,
    ) -> Result<Deployment, DeployError> {
        if request.content.trim().is_empty() {
            return Err(DeployError::Validation(
                "content must not be empty".to_string(),
            ));
        }
        let service_name = normalize_service_name(&request.service_name)?;

        if !self.rate_limiter.check_and_record(identity) {
            let options = self.rate_limiter.options();
            return Err(DeployError::RateLimited(format!(
                "at most {} deployments per {} seconds",
                options.max_requests,
                options.window.as_secs()
            )));
        }

        let credentials = self.credentials.load(identity).await?.require()?;

        let attempt = Attempt {
            id: generate_uuid(),
            owner_id: identity,
            repo_name: compose_repo_name(
                &self.options.repo_prefix,
                &service_name,
                Utc::now().timestamp_millis(),
            ),
            service_name,
            request,
        };
        info!(
            "Starting deployment {} of {} for {}",
            attempt.id, attempt.service_name, identity
        );

        let mut fsm = SagaFsm::new();
        let mut saga = Saga::new();
        let compensator = PlatformCompensator {
            repos: self.repos.as_ref(),
            sites: self.sites.as_ref(),
            credentials: &credentials,
        };

        // step 1: repository
        let repo = match self
            .repos
            .create(&attempt.repo_name, &request.content, &credentials.github_token)
            .await
        {
            Ok(repo) => repo,
            Err(e) => {
                let err = as_repo_creation(e);
                saga.failed(SagaStep::CreateRepository, &err);
                advance(&mut fsm, SagaEvent::RepoCreateFailed(err.to_string()), &attempt.id);
                self.record_failure(&attempt, &err).await;
                return Err(err);
            }
        };
        saga.completed(
            SagaStep::CreateRepository,
            Compensation::DeleteRepository {
                name: attempt.repo_name.clone(),
            },
        );
        advance(&mut fsm, SagaEvent::RepoCreated, &attempt.id);
        debug!("Content published at {}", repo.public_content_url);

        // step 2: hosting service
        let site = match self
            .sites
            .create(SiteRequest {
                name: &attempt.service_name,
                repo_url: &repo.repo_url,
                branch: &repo.branch,
                api_key: &credentials.render_api_key,
            })
            .await
        {
            Ok(site) => site,
            Err(e) => {
                let err = as_site_creation(e);
                saga.failed(SagaStep::CreateSite, &err);
                advance(&mut fsm, SagaEvent::SiteCreateFailed(err.to_string()), &attempt.id);

                let report = saga.compensate(&compensator).await;
                let event = if report.is_clean() {
                    SagaEvent::RollbackSucceeded
                } else {
                    log_orphans(&attempt.id, &report);
                    SagaEvent::RollbackFailed(describe_failures(&report))
                };
                advance(&mut fsm, event, &attempt.id);
                warn!("Deployment {} ended in {:?}", attempt.id, fsm.state());

                self.record_failure(&attempt, &err).await;
                return Err(err);
            }
        };
        saga.completed(
            SagaStep::CreateSite,
            Compensation::DeleteSite {
                service_id: site.service_id.clone(),
            },
        );
        advance(&mut fsm, SagaEvent::SiteCreated, &attempt.id);

        let deployment = Deployment::building(
            attempt.id.clone(),
            identity.to_string(),
            request.page_id.clone(),
            attempt.service_name.clone(),
            request.content.clone(),
            request.template_type.clone(),
            attempt.repo_name.clone(),
            repo.repo_url,
            site.service_id,
        );

        if let Err(e) = self.store.record(deployment.clone()).await {
            error!("Failed to record deployment {}: {}", attempt.id, e);
            // an untracked site would never be polled or cleaned up
            let report = saga.compensate(&compensator).await;
            if !report.is_clean() {
                log_orphans(&attempt.id, &report);
            }
            return Err(e);
        }

        info!(
            "Deployment {} is {} as service {:?}",
            deployment.id, deployment.status, deployment.external_service_id
        );
        Ok(deployment)
    }

    /// Deployments of the caller, newest first. Only calls the hosting
    /// platform when `refresh` is set.
    pub async fn list(&self, identity: &str, refresh: bool) -> Result<Vec<Deployment>, DeployError> {
        if refresh {
            if let Err(e) = self.refresh(identity).await {
                warn!("Status refresh for {} failed: {}", identity, e);
            }
        }
        self.store.list_by_owner(identity).await
    }

    /// A single deployment owned by the caller
    pub async fn get(&self, identity: &str, id: &str) -> Result<Deployment, DeployError> {
        match self.store.get(id).await? {
            Some(deployment) if deployment.owner_id == identity => Ok(deployment),
            _ => Err(DeployError::NotFound(format!("deployment {}", id))),
        }
    }

    /// Poll the hosting platform for every building deployment of the caller.
    /// Returns how many records changed.
    pub async fn refresh(&self, identity: &str) -> Result<usize, DeployError> {
        let pending: Vec<Deployment> = self
            .store
            .list_by_owner(identity)
            .await?
            .into_iter()
            .filter(|d| d.status == DeploymentStatus::Building && d.external_service_id.is_some())
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let Some(api_key) = self.credentials.load(identity).await?.render_api_key else {
            warn!(
                "Cannot refresh {} deployment(s) of {}: Render API key is not configured",
                pending.len(),
                identity
            );
            return Ok(0);
        };

        let mut changed = 0;
        for deployment in &pending {
            if self.refresh_one(deployment, &api_key).await {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Refresh every building deployment regardless of owner
    pub async fn refresh_all(&self) -> Result<usize, DeployError> {
        let owners: BTreeSet<String> = self
            .store
            .list_building()
            .await?
            .into_iter()
            .map(|d| d.owner_id)
            .collect();

        let mut changed = 0;
        for owner in &owners {
            match self.refresh(owner).await {
                Ok(n) => changed += n,
                Err(e) => warn!("Status refresh for {} failed: {}", owner, e),
            }
        }
        Ok(changed)
    }

    async fn refresh_one(&self, deployment: &Deployment, api_key: &SecretString) -> bool {
        let Some(service_id) = deployment.external_service_id.as_deref() else {
            return false;
        };

        let observed = match self.sites.get_status(service_id, api_key).await {
            Ok(observed) => observed,
            Err(e) => {
                warn!("Status lookup for deployment {} failed: {}", deployment.id, e);
                return false;
            }
        };

        let url_is_new = observed.url.is_some() && observed.url != deployment.site_url;
        if observed.status == deployment.status && !url_is_new {
            return false;
        }

        match self
            .store
            .update_status(&deployment.id, observed.status, observed.url)
            .await
        {
            Ok(updated) => {
                info!("Deployment {} is now {}", updated.id, updated.status);
                true
            }
            Err(e) => {
                warn!("Failed to update deployment {}: {}", deployment.id, e);
                false
            }
        }
    }

    /// Persist a failed attempt. A storage failure is logged and never
    /// replaces the platform error reported to the caller.
    async fn record_failure(&self, attempt: &Attempt<'_>, err: &DeployError) {
        let deployment = Deployment::failed(
            attempt.id.clone(),
            attempt.owner_id.to_string(),
            attempt.request.page_id.clone(),
            attempt.service_name.clone(),
            attempt.request.content.clone(),
            attempt.request.template_type.clone(),
            attempt.repo_name.clone(),
            &err.to_string(),
        );

        if let Err(e) = self.store.record(deployment).await {
            error!("Failed to record failed deployment {}: {}", attempt.id, e);
        }
    }
}

/// Undoes completed steps using the caller's own platform credentials
struct PlatformCompensator<'a> {
    repos: &'a dyn RepositoryProvisioner,
    sites: &'a dyn SiteProvisioner,
    credentials: &'a PlatformCredentials,
}

#[async_trait]
impl<'a> Compensator for PlatformCompensator<'a> {
    async fn compensate(&self, action: &Compensation) -> Result<(), DeployError> {
        match action {
            Compensation::DeleteRepository { name } => {
                self.repos.delete(name, &self.credentials.github_token).await
            }
            Compensation::DeleteSite { service_id } => {
                self.sites
                    .delete(service_id, &self.credentials.render_api_key)
                    .await
            }
        }
    }
}

/// Feed an event to the run's state machine. A rejected transition is logged
/// and never interrupts the pipeline once resources may exist.
fn advance(fsm: &mut SagaFsm, event: SagaEvent, deployment_id: &str) {
    if let Err(e) = fsm.process(event) {
        error!(deployment_id = deployment_id, "Saga state not advanced: {}", e);
    }
}

fn as_repo_creation(err: DeployError) -> DeployError {
    match err {
        DeployError::RepoCreation(_) => err,
        other => DeployError::RepoCreation(other.to_string()),
    }
}

fn as_site_creation(err: DeployError) -> DeployError {
    match err {
        DeployError::SiteCreation(_) => err,
        other => DeployError::SiteCreation(other.to_string()),
    }
}

fn log_orphans(deployment_id: &str, report: &CompensationReport) {
    for (action, reason) in &report.failed {
        error!(
            orphan = true,
            deployment_id = deployment_id,
            "Resource left behind, '{}' failed: {}",
            action,
            reason
        );
    }
}

fn describe_failures(report: &CompensationReport) -> String {
    report
        .failed
        .iter()
        .map(|(action, reason)| format!("{}: {}", action, reason))
        .collect::<Vec<_>>()
        .join("; ")
}
