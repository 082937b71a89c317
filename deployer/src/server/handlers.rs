//! HTTP request handlers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use openapi_server::models::{
    CredentialsRequest, CredentialsStatusResponse, DeployRequest, DeployResponse,
    DeploymentSummary, ErrorResponse, HealthResponse, ListDeploymentsQuery, VersionResponse,
};
use secrecy::SecretString;
use tracing::{error, warn};

use crate::authn::credentials::{CredentialsPresence, CredentialsUpdate};
use crate::errors::DeployError;
use crate::models::deployment::bound_error_message;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Header carrying the caller identity, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CallerIdentity(v.to_string()))
            .ok_or_else(|| {
                DeployError::Unauthenticated("missing caller identity".to_string()).into()
            })
    }
}

/// Error response with its wire code
#[derive(Debug)]
pub struct ApiFailure {
    error: DeployError,
    retry_after: Option<Duration>,
}

impl ApiFailure {
    fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

impl From<DeployError> for ApiFailure {
    fn from(error: DeployError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.error);
        }

        let body = Json(ErrorResponse {
            error: self.error.code().to_string(),
            message: bound_error_message(&self.error.to_string()),
        });
        let mut response = (status, body).into_response();

        if let Some(retry_after) = self.retry_after {
            // round up so clients never retry early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployer".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Deploy handler
///
/// The pipeline runs on its own task so a disconnecting caller cannot
/// interrupt it between the two platform calls.
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    CallerIdentity(identity): CallerIdentity,
    payload: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DeployResponse>), ApiFailure> {
    let Json(request) =
        payload.map_err(|e| DeployError::Validation(e.body_text()))?;

    let orchestrator = state.orchestrator.clone();
    let owner = identity.clone();
    let task = tokio::spawn(async move { orchestrator.deploy(&owner, &request).await });

    let deployment = match task.await {
        Ok(Ok(deployment)) => deployment,
        Ok(Err(e @ DeployError::RateLimited(_))) => {
            warn!("Deployment rejected for {}: {}", identity, e);
            let retry_after = state.orchestrator.rate_limiter().retry_after(&identity);
            return Err(ApiFailure::from(e).with_retry_after(retry_after));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(e) => {
            return Err(DeployError::Internal(format!("deployment task failed: {}", e)).into())
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(DeployResponse {
            deployment_id: deployment.id,
            service_name: deployment.service_name,
            status: deployment.status.as_str().to_string(),
            repo_url: deployment.repo_url.unwrap_or_default(),
            external_service_id: deployment.external_service_id.unwrap_or_default(),
        }),
    ))
}

/// Deployment listing handler
pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
    CallerIdentity(identity): CallerIdentity,
    query: Result<Query<ListDeploymentsQuery>, QueryRejection>,
) -> Result<Json<Vec<DeploymentSummary>>, ApiFailure> {
    let Query(query) = query.map_err(|e| DeployError::Validation(e.body_text()))?;

    let deployments = state.orchestrator.list(&identity, query.refresh).await?;
    Ok(Json(deployments.iter().map(|d| d.summary()).collect()))
}

/// Single deployment handler
pub async fn get_deployment_handler(
    State(state): State<Arc<ServerState>>,
    CallerIdentity(identity): CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<DeploymentSummary>, ApiFailure> {
    let deployment = state.orchestrator.get(&identity, &id).await?;
    Ok(Json(deployment.summary()))
}

/// Credentials update handler
pub async fn put_credentials_handler(
    State(state): State<Arc<ServerState>>,
    CallerIdentity(identity): CallerIdentity,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<CredentialsStatusResponse>, ApiFailure> {
    let Json(request) =
        payload.map_err(|e| DeployError::Validation(e.body_text()))?;

    if request.github_token.is_none() && request.render_api_key.is_none() {
        return Err(DeployError::Validation(
            "at least one of githubToken or renderApiKey is required".to_string(),
        )
        .into());
    }

    let update = CredentialsUpdate {
        github_token: request.github_token.map(SecretString::from),
        render_api_key: request.render_api_key.map(SecretString::from),
    };
    let presence = state.credentials.upsert(&identity, update).await?;
    Ok(Json(presence_response(presence)))
}

/// Credentials presence handler
pub async fn get_credentials_handler(
    State(state): State<Arc<ServerState>>,
    CallerIdentity(identity): CallerIdentity,
) -> Result<Json<CredentialsStatusResponse>, ApiFailure> {
    let presence = state.credentials.presence(&identity).await?;
    Ok(Json(presence_response(presence)))
}

fn presence_response(presence: CredentialsPresence) -> CredentialsStatusResponse {
    CredentialsStatusResponse {
        github_configured: presence.github,
        render_configured: presence.render,
    }
}
