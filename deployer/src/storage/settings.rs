//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to daily files under the logs directory
    #[serde(default = "default_true")]
    pub log_to_file: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Per-user deployment rate limit
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Source-control host configuration
    #[serde(default)]
    pub github: GithubSettings,

    /// Hosting platform configuration
    #[serde(default)]
    pub render: RenderSettings,

    /// Prefix of every created repository name
    #[serde(default = "default_repo_prefix")]
    pub repo_prefix: String,

    /// Timeout applied to every upstream request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Enable the background status poller
    #[serde(default = "default_true")]
    pub enable_status_poller: bool,

    /// Status polling interval in seconds
    #[serde(default = "default_polling_interval")]
    pub status_poll_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_repo_prefix() -> String {
    "site".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_polling_interval() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: true,
            server: ServerSettings::default(),
            rate_limit: RateLimitSettings::default(),
            github: GithubSettings::default(),
            render: RenderSettings::default(),
            repo_prefix: default_repo_prefix(),
            request_timeout_secs: default_request_timeout(),
            enable_status_poller: true,
            status_poll_interval_secs: default_polling_interval(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Rate limit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Trailing window length in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// Deployments admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

fn default_window() -> u64 {
    600
}

fn default_max_requests() -> usize {
    5
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: default_window(),
            max_requests: default_max_requests(),
        }
    }
}

/// Source-control host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSettings {
    /// Base URL of the REST API
    #[serde(default = "default_github_url")]
    pub api_url: String,
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_url: default_github_url(),
        }
    }
}

/// Hosting platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Base URL of the REST API
    #[serde(default = "default_render_url")]
    pub api_url: String,
}

fn default_render_url() -> String {
    "https://api.render.com".to_string()
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            api_url: default_render_url(),
        }
    }
}
