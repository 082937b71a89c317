//! HTTP client implementation

use std::fmt;
use std::time::Duration;

use openapi_client::models::UpstreamError;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::DeployError;

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout, covering connect and body
    pub timeout: Duration,

    /// User agent sent with every request
    pub user_agent: String,

    /// Value of the `Accept` header
    pub accept: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("deployer/{}", env!("CARGO_PKG_VERSION")),
            accept: "application/json".to_string(),
        }
    }
}

/// Failed upstream call. `status` is absent for transport failures and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} - {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        Self {
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

/// HTTP client for one upstream platform
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    accept: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, options: &HttpOptions) -> Result<Self, DeployError> {
        url::Url::parse(base_url).map_err(|e| {
            DeployError::Configuration(format!("invalid API base URL '{}': {}", base_url, e))
        })?;

        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            accept: options.accept.clone(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path, token)).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.request(Method::POST, path, token).json(body);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.request(Method::PUT, path, token).json(body);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Make a DELETE request, the response body is discarded
    pub async fn delete(&self, path: &str, token: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path, token)).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        self.client
            .request(method, &url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::ACCEPT, &self.accept)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let url = response.url().path().to_string();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP request to {} failed: {} - {}", url, status, body);
            return Err(ApiError {
                status: Some(status.as_u16()),
                message: upstream_message(status.canonical_reason(), &body),
            });
        }

        Ok(response)
    }
}

/// Prefer the platform's `message` field, then the raw body, then the reason phrase
fn upstream_message(reason: Option<&str>, body: &str) -> String {
    if let Ok(UpstreamError { message: Some(message) }) = serde_json::from_str(body) {
        return message;
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    reason.unwrap_or("unknown error").to_string()
}
