//! Application state management

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::info;

use crate::app::options::AppOptions;
use crate::authn::credentials::{load_or_create_key, CredentialStore, EncryptedCredentialStore};
use crate::deploy::orchestrator::DeploymentOrchestrator;
use crate::deploy::repository::GithubProvisioner;
use crate::deploy::site::RenderProvisioner;
use crate::errors::DeployError;
use crate::http::client::{HttpClient, HttpOptions};
use crate::ratelimit::RateLimiter;
use crate::storage::deployments::{DeploymentStore, LocalDeploymentStore};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Main application state
pub struct AppState {
    /// Per-user deployment rate limiter
    pub rate_limiter: Arc<RateLimiter>,

    /// Sealed platform credentials
    pub credentials: Arc<dyn CredentialStore>,

    /// Deployment records
    pub deployments: Arc<dyn DeploymentStore>,

    /// Deployment orchestrator
    pub orchestrator: Arc<DeploymentOrchestrator>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, DeployError> {
        info!("Initializing application state...");

        let layout = &options.layout;
        layout.setup().await?;

        // Credentials
        let key = load_or_create_key(
            options
                .credentials_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            &layout.credentials_key_file(),
        )
        .await?;
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(EncryptedCredentialStore::open(key, layout.credentials_file()).await?);

        // Deployment records
        let deployments: Arc<dyn DeploymentStore> =
            Arc::new(LocalDeploymentStore::open(layout.deployments_file()).await?);

        // Upstream clients
        let github_client = HttpClient::new(
            &options.platforms.github_api_url,
            &HttpOptions {
                timeout: options.platforms.request_timeout,
                accept: GITHUB_ACCEPT.to_string(),
                ..Default::default()
            },
        )?;
        let render_client = HttpClient::new(
            &options.platforms.render_api_url,
            &HttpOptions {
                timeout: options.platforms.request_timeout,
                ..Default::default()
            },
        )?;

        let rate_limiter = Arc::new(RateLimiter::new(options.rate_limit.clone()));

        let orchestrator = Arc::new(DeploymentOrchestrator::new(
            options.orchestrator.clone(),
            rate_limiter.clone(),
            credentials.clone(),
            Arc::new(GithubProvisioner::new(
                github_client,
                options.repository.clone(),
            )),
            Arc::new(RenderProvisioner::new(render_client, options.site.clone())),
            deployments.clone(),
        ));

        Ok(Self {
            rate_limiter,
            credentials,
            deployments,
            orchestrator,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), DeployError> {
        info!("Shutting down application state...");
        Ok(())
    }
}
