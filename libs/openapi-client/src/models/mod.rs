//! Platform API models
//!
//! Only the fields the deployer reads or writes are modelled; everything else
//! the platforms return is ignored during deserialization.

use serde::{Deserialize, Serialize};

// ================================ SOURCE CONTROL ================================= //

/// Authenticated source-control user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

/// Repository creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRepositoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub private: bool,
    pub auto_init: bool,
}

/// Repository as returned by the source-control host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub owner: GithubUser,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// File contents upload request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutContentsRequest {
    pub message: String,
    /// Base64 encoded file body
    pub content: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Existing file metadata, used to obtain the blob sha before overwriting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentsEntry {
    pub sha: String,
    pub path: String,
}

// ================================ STATIC HOSTING ================================= //

/// Page entry of the owners listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerEntry {
    pub owner: Owner,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Hosting account (user or team)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Static site service creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    #[serde(rename = "type")]
    pub service_type: String,
    pub name: String,
    pub owner_id: String,
    pub repo: String,
    pub branch: String,
    pub auto_deploy: String,
    pub service_details: StaticSiteDetails,
}

/// Static site specific service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSiteDetails {
    pub publish_path: String,
    pub build_command: String,
}

/// Service creation response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceResponse {
    pub service: Service,
    #[serde(default)]
    pub deploy_id: Option<String>,
}

/// Hosting service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub suspended: Option<String>,
    #[serde(default)]
    pub service_details: Option<ServiceDetails>,
}

/// Service details, only the public URL is of interest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDetails {
    #[serde(default)]
    pub url: Option<String>,
}

/// Page entry of the deploys listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployEntry {
    pub deploy: Deploy,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Single deploy of a service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deploy {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

/// Error body returned by either platform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamError {
    #[serde(default)]
    pub message: Option<String>,
}
