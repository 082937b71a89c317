//! Token encryption at rest
//!
//! Platform tokens are sealed with AES-256-GCM under a single process key.
//! Each sealed value carries its own random 96-bit nonce.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Size of the encryption key in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Process-wide key used to seal credentials
pub struct CredentialKey {
    bytes: SecretBox<[u8; KEY_SIZE]>,
}

impl CredentialKey {
    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = Box::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self {
            bytes: SecretBox::new(bytes),
        }
    }

    /// Decode a base64 encoded key
    pub fn from_base64(encoded: &str) -> Result<Self, DeployError> {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| DeployError::Credential(format!("invalid key encoding: {}", e)))?;

        if decoded.len() != KEY_SIZE {
            return Err(DeployError::Credential(format!(
                "invalid key size: expected {} bytes, got {}",
                KEY_SIZE,
                decoded.len()
            )));
        }

        let mut bytes = Box::new([0u8; KEY_SIZE]);
        bytes.copy_from_slice(&decoded);
        Ok(Self {
            bytes: SecretBox::new(bytes),
        })
    }

    /// Encode the key as base64, for writing the key file
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes.expose_secret())
    }

    fn cipher(&self) -> Aes256Gcm {
        let key = Key::<Aes256Gcm>::from_slice(self.bytes.expose_secret());
        Aes256Gcm::new(key)
    }
}

impl std::fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialKey([REDACTED])")
    }
}

/// Encrypted value with nonce, both base64 encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    pub ciphertext: String,
    pub nonce: String,
}

/// Encrypt a token
pub fn seal(key: &CredentialKey, plaintext: &SecretString) -> Result<SealedValue, DeployError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(nonce, plaintext.expose_secret().as_bytes())
        .map_err(|e| DeployError::Credential(format!("encryption failed: {}", e)))?;

    Ok(SealedValue {
        ciphertext: STANDARD.encode(ciphertext),
        nonce: STANDARD.encode(nonce_bytes),
    })
}

/// Decrypt a token
pub fn open(key: &CredentialKey, sealed: &SealedValue) -> Result<SecretString, DeployError> {
    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .map_err(|e| DeployError::Credential(format!("invalid ciphertext encoding: {}", e)))?;
    let nonce_bytes = STANDARD
        .decode(&sealed.nonce)
        .map_err(|e| DeployError::Credential(format!("invalid nonce encoding: {}", e)))?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(DeployError::Credential(format!(
            "invalid nonce size: expected {} bytes, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|e| DeployError::Credential(format!("decryption failed: {}", e)))?;

    let plaintext = String::from_utf8(plaintext)
        .map_err(|_| DeployError::Credential("decrypted token is not UTF-8".to_string()))?;

    Ok(SecretString::from(plaintext))
}
