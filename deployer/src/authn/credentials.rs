//! Per-user platform credentials

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::authn::encryption::{open, seal, CredentialKey, SealedValue};
use crate::errors::DeployError;
use crate::filesys::file::File;

/// Platform tokens for one user. Either may be absent until configured.
#[derive(Debug, Clone, Default)]
pub struct UserCredentials {
    pub github_token: Option<SecretString>,
    pub render_api_key: Option<SecretString>,
}

/// Both platform tokens, as required by a deployment
#[derive(Debug, Clone)]
pub struct PlatformCredentials {
    pub github_token: SecretString,
    pub render_api_key: SecretString,
}

impl UserCredentials {
    /// Require both tokens, naming whichever is missing
    pub fn require(self) -> Result<PlatformCredentials, DeployError> {
        match (self.github_token, self.render_api_key) {
            (Some(github_token), Some(render_api_key)) => Ok(PlatformCredentials {
                github_token,
                render_api_key,
            }),
            (None, Some(_)) => Err(DeployError::Configuration(
                "GitHub token is not configured".to_string(),
            )),
            (Some(_), None) => Err(DeployError::Configuration(
                "Render API key is not configured".to_string(),
            )),
            (None, None) => Err(DeployError::Configuration(
                "GitHub token and Render API key are not configured".to_string(),
            )),
        }
    }
}

/// Partial credentials update, absent fields keep their stored value
#[derive(Debug, Clone, Default)]
pub struct CredentialsUpdate {
    pub github_token: Option<SecretString>,
    pub render_api_key: Option<SecretString>,
}

/// Which tokens are configured, safe to expose to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialsPresence {
    pub github: bool,
    pub render: bool,
}

/// Credential store trait for testability
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load and decrypt the credentials of a user
    async fn load(&self, owner_id: &str) -> Result<UserCredentials, DeployError>;

    /// Store new tokens for a user, replacing any previous value per platform
    async fn upsert(
        &self,
        owner_id: &str,
        update: CredentialsUpdate,
    ) -> Result<CredentialsPresence, DeployError>;

    /// Report which tokens are configured without decrypting them
    async fn presence(&self, owner_id: &str) -> Result<CredentialsPresence, DeployError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SealedCredentials {
    #[serde(default)]
    github_token: Option<SealedValue>,
    #[serde(default)]
    render_api_key: Option<SealedValue>,
}

/// Credential store keeping only sealed tokens, in memory and optionally on disk
pub struct EncryptedCredentialStore {
    key: CredentialKey,
    file: Option<File>,
    entries: RwLock<HashMap<String, SealedCredentials>>,
}

impl EncryptedCredentialStore {
    /// Create an in-memory store
    pub fn in_memory(key: CredentialKey) -> Self {
        Self {
            key,
            file: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Open a file backed store, loading existing entries
    pub async fn open(key: CredentialKey, file: File) -> Result<Self, DeployError> {
        let entries: HashMap<String, SealedCredentials> = file
            .read_json_or_default()
            .await
            .map_err(|e| DeployError::Storage(format!("failed to read credentials: {}", e)))?;

        info!("Loaded credentials for {} user(s)", entries.len());

        Ok(Self {
            key,
            file: Some(file),
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &HashMap<String, SealedCredentials>) -> Result<(), DeployError> {
        if let Some(file) = &self.file {
            file.write_json(entries)
                .await
                .map_err(|e| DeployError::Storage(format!("failed to write credentials: {}", e)))?;
            file.set_permissions_600().await?;
        }
        Ok(())
    }

    fn seal_token(&self, token: &SecretString) -> Result<SealedValue, DeployError> {
        if token.expose_secret().trim().is_empty() {
            return Err(DeployError::Validation("token must not be empty".to_string()));
        }
        seal(&self.key, token)
    }
}

#[async_trait]
impl CredentialStore for EncryptedCredentialStore {
    async fn load(&self, owner_id: &str) -> Result<UserCredentials, DeployError> {
        let entries = self.entries.read().await;
        let Some(sealed) = entries.get(owner_id) else {
            return Ok(UserCredentials::default());
        };

        let github_token = sealed
            .github_token
            .as_ref()
            .map(|v| open(&self.key, v))
            .transpose()?;
        let render_api_key = sealed
            .render_api_key
            .as_ref()
            .map(|v| open(&self.key, v))
            .transpose()?;

        Ok(UserCredentials {
            github_token,
            render_api_key,
        })
    }

    async fn upsert(
        &self,
        owner_id: &str,
        update: CredentialsUpdate,
    ) -> Result<CredentialsPresence, DeployError> {
        let github = update
            .github_token
            .as_ref()
            .map(|t| self.seal_token(t))
            .transpose()?;
        let render = update
            .render_api_key
            .as_ref()
            .map(|t| self.seal_token(t))
            .transpose()?;

        let mut entries = self.entries.write().await;
        let previous = entries.get(owner_id).cloned();
        let entry = entries.entry(owner_id.to_string()).or_default();
        if github.is_some() {
            entry.github_token = github;
        }
        if render.is_some() {
            entry.render_api_key = render;
        }
        let presence = CredentialsPresence {
            github: entry.github_token.is_some(),
            render: entry.render_api_key.is_some(),
        };

        if let Err(e) = self.persist(&entries).await {
            // memory must match what a restart would load
            match previous {
                Some(previous) => entries.insert(owner_id.to_string(), previous),
                None => entries.remove(owner_id),
            };
            return Err(e);
        }
        debug!("Updated credentials for {}", owner_id);

        Ok(presence)
    }

    async fn presence(&self, owner_id: &str) -> Result<CredentialsPresence, DeployError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(owner_id)
            .map(|e| CredentialsPresence {
                github: e.github_token.is_some(),
                render: e.render_api_key.is_some(),
            })
            .unwrap_or(CredentialsPresence {
                github: false,
                render: false,
            }))
    }
}

/// Resolve the credential key from its base64 env value, or from the key file,
/// generating and writing a new key on first start
pub async fn load_or_create_key(
    env_value: Option<String>,
    key_file: &File,
) -> Result<CredentialKey, DeployError> {
    if let Some(encoded) = env_value.filter(|v| !v.trim().is_empty()) {
        return CredentialKey::from_base64(&encoded);
    }

    if key_file.exists().await {
        let encoded = key_file.read_string().await?;
        return CredentialKey::from_base64(&encoded);
    }

    info!("Generating credential key at {}", key_file.path().display());
    let key = CredentialKey::generate();
    key_file.write_atomic(key.to_base64().as_bytes()).await?;
    key_file.set_permissions_600().await?;
    Ok(key)
}
