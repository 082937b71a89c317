//! Static hosting platform API calls

use openapi_client::models::{
    CreateServiceRequest, CreateServiceResponse, DeployEntry, OwnerEntry, Service,
};

use crate::http::client::{ApiError, HttpClient};

impl HttpClient {
    /// List the owners visible to the API key
    pub async fn list_owners(&self, token: &str, limit: u32) -> Result<Vec<OwnerEntry>, ApiError> {
        let path = format!("/v1/owners?limit={}", limit);
        self.get(&path, token).await
    }

    /// Create a service
    pub async fn create_service(
        &self,
        token: &str,
        request: &CreateServiceRequest,
    ) -> Result<CreateServiceResponse, ApiError> {
        self.post("/v1/services", token, request).await
    }

    /// Get service info
    pub async fn get_service(&self, token: &str, service_id: &str) -> Result<Service, ApiError> {
        let path = format!("/v1/services/{}", service_id);
        self.get(&path, token).await
    }

    /// List the most recent deploys of a service, newest first
    pub async fn list_deploys(
        &self,
        token: &str,
        service_id: &str,
        limit: u32,
    ) -> Result<Vec<DeployEntry>, ApiError> {
        let path = format!("/v1/services/{}/deploys?limit={}", service_id, limit);
        self.get(&path, token).await
    }

    /// Delete a service
    pub async fn delete_service(&self, token: &str, service_id: &str) -> Result<(), ApiError> {
        let path = format!("/v1/services/{}", service_id);
        self.delete(&path, token).await
    }
}
