//! Repository provisioning on the source-control host

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use openapi_client::models::{CreateRepositoryRequest, PutContentsRequest};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};

use crate::errors::DeployError;
use crate::http::client::{ApiError, HttpClient};
use crate::utils::token_fingerprint;

/// Repository created for a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRepository {
    /// Browsable repository URL, also used to bind the hosting service
    pub repo_url: String,

    /// Direct URL of the published content file
    pub public_content_url: String,

    /// Branch holding the content, the one the site must deploy from
    pub branch: String,
}

/// Repository provisioner trait for testability
#[async_trait]
pub trait RepositoryProvisioner: Send + Sync {
    /// Create a repository holding `content` at the publish path
    async fn create(
        &self,
        name: &str,
        content: &str,
        token: &SecretString,
    ) -> Result<CreatedRepository, DeployError>;

    /// Delete a repository. Deleting a missing repository succeeds.
    async fn delete(&self, name: &str, token: &SecretString) -> Result<(), DeployError>;
}

/// Repository layout settings
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// Branch the hosting platform deploys from
    pub branch: String,

    /// Path of the content file inside the repository
    pub content_path: String,

    /// Base URL serving raw repository files
    pub raw_content_base_url: String,

    pub commit_message: String,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            content_path: "index.html".to_string(),
            raw_content_base_url: "https://raw.githubusercontent.com".to_string(),
            commit_message: "Publish generated site".to_string(),
        }
    }
}

/// GitHub backed repository provisioner
pub struct GithubProvisioner {
    client: HttpClient,
    options: RepositoryOptions,
    logins: RwLock<HashMap<String, String>>,
}

impl GithubProvisioner {
    pub fn new(client: HttpClient, options: RepositoryOptions) -> Self {
        Self {
            client,
            options,
            logins: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the login owning the token, cached per token fingerprint
    async fn login(&self, token: &SecretString) -> Result<String, ApiError> {
        let fingerprint = token_fingerprint(token);
        {
            let logins = self.logins.read().unwrap_or_else(|e| e.into_inner());
            if let Some(login) = logins.get(&fingerprint) {
                return Ok(login.clone());
            }
        }

        let user = self
            .client
            .get_authenticated_user(token.expose_secret())
            .await?;
        debug!("Resolved source-control login {}", user.login);

        let mut logins = self.logins.write().unwrap_or_else(|e| e.into_inner());
        logins.insert(fingerprint, user.login.clone());
        Ok(user.login)
    }

    async fn push_content(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        branch: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        // auto_init may already have created the file on some hosts
        let existing = self
            .client
            .get_contents(token, owner, repo, &self.options.content_path)
            .await?;

        let request = PutContentsRequest {
            message: self.options.commit_message.clone(),
            content: STANDARD.encode(content.as_bytes()),
            branch: branch.to_string(),
            sha: existing.map(|e| e.sha),
        };
        self.client
            .put_contents(token, owner, repo, &self.options.content_path, &request)
            .await
    }
}

#[async_trait]
impl RepositoryProvisioner for GithubProvisioner {
    async fn create(
        &self,
        name: &str,
        content: &str,
        token: &SecretString,
    ) -> Result<CreatedRepository, DeployError> {
        info!("Creating repository {}", name);

        let request = CreateRepositoryRequest {
            name: name.to_string(),
            description: Some("Generated static site".to_string()),
            private: false,
            auto_init: true,
        };
        let repo = self
            .client
            .create_repository(token.expose_secret(), &request)
            .await
            .map_err(|e| DeployError::RepoCreation(describe_create_failure(&e)))?;

        let owner = repo.owner.login.clone();
        let branch = if repo.default_branch.is_empty() {
            self.options.branch.clone()
        } else {
            repo.default_branch.clone()
        };

        if let Err(e) = self
            .push_content(token.expose_secret(), &owner, &repo.name, &branch, content)
            .await
        {
            error!("Failed to push content to {}: {}", repo.full_name, e);
            // an empty repository is of no use to anyone, remove it before reporting
            if let Err(cleanup) = self
                .client
                .delete_repository(token.expose_secret(), &owner, &repo.name)
                .await
            {
                if !cleanup.is_not_found() {
                    error!(
                        orphan = true,
                        "Repository {} left behind after failed content push: {}",
                        repo.full_name,
                        cleanup
                    );
                }
            }
            return Err(DeployError::RepoCreation(format!(
                "failed to publish content: {}",
                e
            )));
        }

        info!("Repository {} created", repo.full_name);

        Ok(CreatedRepository {
            repo_url: repo.html_url,
            public_content_url: format!(
                "{}/{}/{}/{}/{}",
                self.options.raw_content_base_url.trim_end_matches('/'),
                owner,
                repo.name,
                branch,
                self.options.content_path
            ),
            branch,
        })
    }

    async fn delete(&self, name: &str, token: &SecretString) -> Result<(), DeployError> {
        let owner = self
            .login(token)
            .await
            .map_err(|e| DeployError::RepoDeletion(e.to_string()))?;

        match self
            .client
            .delete_repository(token.expose_secret(), &owner, name)
            .await
        {
            Ok(()) => {
                info!("Repository {}/{} deleted", owner, name);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("Repository {}/{} already absent", owner, name);
                Ok(())
            }
            Err(e) => Err(DeployError::RepoDeletion(e.to_string())),
        }
    }
}

fn describe_create_failure(err: &ApiError) -> String {
    match err.status {
        Some(401) => format!("authentication failed: {}", err.message),
        Some(403) => format!("access denied or quota exhausted: {}", err.message),
        Some(422) => format!("repository name unavailable: {}", err.message),
        _ => err.to_string(),
    }
}
