//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use openapi_server::models::DeploymentSummary;

/// Upper bound on stored error messages, in characters
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Externally visible deployment status
///
/// `Building` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Building,
    Live,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Building => "building",
            DeploymentStatus::Live => "live",
            DeploymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeploymentStatus::Building)
    }

    /// Whether moving from `self` to `next` respects the monotonic lifecycle.
    /// Re-applying the current status is allowed and is a no-op.
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        *self == next || *self == DeploymentStatus::Building
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single orchestration attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: String,

    /// Identity of the caller that requested the deployment
    pub owner_id: String,

    pub page_id: Option<String>,

    /// Normalized slug derived from the requested service name
    pub service_name: String,

    pub status: DeploymentStatus,

    /// The static content exactly as it was pushed
    pub content_snapshot: String,

    /// Unique repository name composed for this attempt
    #[serde(default)]
    pub repo_name: Option<String>,

    pub repo_url: Option<String>,

    pub external_service_id: Option<String>,

    /// Public URL, known once the hosting platform reports it
    #[serde(default)]
    pub site_url: Option<String>,

    #[serde(default)]
    pub template_type: Option<String>,

    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// A deployment whose repository and site were both created
    #[allow(clippy::too_many_arguments)]
    pub fn building(
        id: String,
        owner_id: String,
        page_id: Option<String>,
        service_name: String,
        content_snapshot: String,
        template_type: Option<String>,
        repo_name: String,
        repo_url: String,
        external_service_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            page_id,
            service_name,
            status: DeploymentStatus::Building,
            content_snapshot,
            repo_name: Some(repo_name),
            repo_url: Some(repo_url),
            external_service_id: Some(external_service_id),
            site_url: None,
            template_type,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A deployment that failed at or after repository creation
    #[allow(clippy::too_many_arguments)]
    pub fn failed(
        id: String,
        owner_id: String,
        page_id: Option<String>,
        service_name: String,
        content_snapshot: String,
        template_type: Option<String>,
        repo_name: String,
        error: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            page_id,
            service_name,
            status: DeploymentStatus::Failed,
            content_snapshot,
            repo_name: Some(repo_name),
            repo_url: None,
            external_service_id: None,
            site_url: None,
            template_type,
            error_message: Some(bound_error_message(error)),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an observed status. Returns `false` when the transition would
    /// leave a terminal state, in which case the record is left untouched.
    pub fn apply_status(&mut self, status: DeploymentStatus, site_url: Option<String>) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        if self.status == status && site_url.is_none() {
            return true;
        }

        self.status = status;
        if site_url.is_some() {
            self.site_url = site_url;
        }
        self.updated_at = Utc::now();
        true
    }

    pub fn summary(&self) -> DeploymentSummary {
        DeploymentSummary {
            id: self.id.clone(),
            service_name: self.service_name.clone(),
            status: self.status.as_str().to_string(),
            site_url: self.site_url.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
        }
    }
}

/// Truncate an error message to [`MAX_ERROR_MESSAGE_LEN`] characters
pub fn bound_error_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return message.to_string();
    }
    let mut bounded: String = message.chars().take(MAX_ERROR_MESSAGE_LEN - 3).collect();
    bounded.push_str("...");
    bounded
}
