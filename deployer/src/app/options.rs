//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::orchestrator::OrchestratorOptions;
use crate::deploy::repository::RepositoryOptions;
use crate::deploy::site::SiteOptions;
use crate::ratelimit::RateLimitOptions;
use crate::storage::layout::StorageLayout;
use crate::workers::{maintenance, status_poller};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Server configuration
    pub server: ServerOptions,

    /// Upstream platforms
    pub platforms: PlatformOptions,

    /// Per-user deployment rate limit
    pub rate_limit: RateLimitOptions,

    pub orchestrator: OrchestratorOptions,

    pub repository: RepositoryOptions,

    pub site: SiteOptions,

    /// Base64 credential encryption key, overrides the key file
    pub credentials_key: Option<SecretString>,

    /// Enable the status poller worker
    pub enable_status_poller: bool,

    /// Status poller worker options
    pub status_poller: status_poller::Options,

    /// Maintenance worker options
    pub maintenance: maintenance::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            layout: StorageLayout::default(),
            server: ServerOptions::default(),
            platforms: PlatformOptions::default(),
            rate_limit: RateLimitOptions::default(),
            orchestrator: OrchestratorOptions::default(),
            repository: RepositoryOptions::default(),
            site: SiteOptions::default(),
            credentials_key: None,
            enable_status_poller: true,
            status_poller: status_poller::Options::default(),
            maintenance: maintenance::Options::default(),
        }
    }
}

/// Lifecycle options for the deployer
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Upstream API endpoints and request limits
#[derive(Debug, Clone)]
pub struct PlatformOptions {
    /// Source-control host API base URL
    pub github_api_url: String,

    /// Hosting platform API base URL
    pub render_api_url: String,

    /// Timeout applied to every upstream request
    pub request_timeout: Duration,
}

impl Default for PlatformOptions {
    fn default() -> Self {
        Self {
            github_api_url: "https://api.github.com".to_string(),
            render_api_url: "https://api.render.com".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
