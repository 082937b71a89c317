//! Source-control host API calls

use openapi_client::models::{
    ContentsEntry, CreateRepositoryRequest, GithubUser, PutContentsRequest, Repository,
};

use crate::http::client::{ApiError, HttpClient};

impl HttpClient {
    /// Get the user owning the token
    pub async fn get_authenticated_user(&self, token: &str) -> Result<GithubUser, ApiError> {
        self.get("/user", token).await
    }

    /// Create a repository under the authenticated user
    pub async fn create_repository(
        &self,
        token: &str,
        request: &CreateRepositoryRequest,
    ) -> Result<Repository, ApiError> {
        self.post("/user/repos", token, request).await
    }

    /// Look up an existing file, `None` when the path does not exist yet
    pub async fn get_contents(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<ContentsEntry>, ApiError> {
        let path = format!("/repos/{}/{}/contents/{}", owner, repo, path);
        match self.get(&path, token).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or replace a file in a repository
    pub async fn put_contents(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        path: &str,
        request: &PutContentsRequest,
    ) -> Result<(), ApiError> {
        let path = format!("/repos/{}/{}/contents/{}", owner, repo, path);
        let _: serde_json::Value = self.put(&path, token, request).await?;
        Ok(())
    }

    /// Delete a repository
    pub async fn delete_repository(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> Result<(), ApiError> {
        let path = format!("/repos/{}/{}", owner, repo);
        self.delete(&path, token).await
    }
}
