//! Error types for the deployer

use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Deployment configuration missing: {0}")]
    Configuration(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Repository creation failed: {0}")]
    RepoCreation(String),

    #[error("Repository deletion failed: {0}")]
    RepoDeletion(String),

    #[error("Site creation failed: {0}")]
    SiteCreation(String),

    #[error("Site deletion failed: {0}")]
    SiteDeletion(String),

    #[error("Site status lookup failed: {0}")]
    SiteStatus(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Stable error code exposed to API callers
    pub fn code(&self) -> &'static str {
        match self {
            DeployError::Validation(_) => "validation_failed",
            DeployError::Configuration(_) => "deployment_config_missing",
            DeployError::RateLimited(_) => "rate_limited",
            DeployError::RepoCreation(_) => "repo_creation_failed",
            DeployError::SiteCreation(_) => "site_creation_failed",
            DeployError::Unauthenticated(_) => "unauthenticated",
            DeployError::NotFound(_) => "not_found",
            _ => "internal_error",
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            DeployError::Validation(_) | DeployError::Configuration(_) => 400,
            DeployError::Unauthenticated(_) => 401,
            DeployError::NotFound(_) => 404,
            DeployError::RateLimited(_) => 429,
            _ => 500,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
