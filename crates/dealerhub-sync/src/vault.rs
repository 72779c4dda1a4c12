//! # Credential Vault
//!
//! AES-256-GCM encryption of per-dealership EasyCars credentials.
//!
//! ## Stored Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Ciphertext Layout (base64)                           │
//! │                                                                         │
//! │   ┌──────────────┬──────────────────┬──────────────────────────────┐   │
//! │   │  nonce (12B) │  auth tag (16B)  │  ciphertext (len(plaintext)) │   │
//! │   └──────────────┴──────────────────┴──────────────────────────────┘   │
//! │                                                                         │
//! │   • A fresh random nonce per call, so encrypting the same value        │
//! │     twice yields two different strings                                 │
//! │   • Any flipped byte fails the tag check (AuthenticationFailed)        │
//! │   • Bad base64 or a payload shorter than 28 bytes is MalformedInput    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The vault holds nothing but the cipher, so one instance is shared by
//! every concurrent dealership sync.

use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use thiserror::Error;

use dealerhub_core::validation::ValidCredentialInput;
use dealerhub_core::{Credential, DealershipId, Environment};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Credential encryption errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// No encryption key was configured.
    #[error("Encryption key is not configured (set EASYCARS_ENCRYPTION_KEY)")]
    MissingKey,

    /// The key is not base64 or does not decode to 32 bytes.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// Ciphertext is not valid base64 or is too short.
    #[error("Malformed ciphertext: {0}")]
    MalformedInput(String),

    /// Tag check failed: tampered data or the wrong key.
    #[error("Ciphertext authentication failed")]
    AuthenticationFailed,

    #[error("Encryption failed")]
    EncryptionFailed,
}

/// Decrypted EasyCars account credentials, passed explicitly to every call.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub account_number: String,
    pub account_secret: String,
    pub environment: Environment,
    pub yard_code: Option<String>,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("account_number", &"<redacted>")
            .field("account_secret", &"<redacted>")
            .field("environment", &self.environment)
            .field("yard_code", &self.yard_code)
            .finish()
    }
}

/// AES-256-GCM vault for credential fields.
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialVault { .. }")
    }
}

impl CredentialVault {
    /// Creates a vault from raw key bytes. The key must be exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, VaultError> {
        if key.len() != KEY_LEN {
            return Err(VaultError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        Ok(CredentialVault { cipher })
    }

    /// Creates a vault from a base64-encoded key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, VaultError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(VaultError::MissingKey);
        }
        let key = STANDARD
            .decode(encoded)
            .map_err(|e| VaultError::InvalidKey(format!("not base64: {e}")))?;
        Self::new(&key)
    }

    /// Creates a vault from an optional configured key.
    ///
    /// Used at startup: a missing or bad key must stop the process.
    pub fn from_configured_key(key: Option<&str>) -> Result<Self, VaultError> {
        match key {
            Some(key) => Self::from_base64_key(key),
            None => Err(VaultError::MissingKey),
        }
    }

    /// Encrypts a string into the stored base64 format.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + buffer.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(tag.as_slice());
        out.extend_from_slice(&buffer);
        Ok(STANDARD.encode(out))
    }

    /// Decrypts a value produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| VaultError::MalformedInput(format!("not base64: {e}")))?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::MalformedInput(format!(
                "{} bytes is shorter than nonce and tag",
                bytes.len()
            )));
        }

        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        let (tag, body) = rest.split_at(TAG_LEN);
        let mut buffer = body.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                b"",
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| VaultError::AuthenticationFailed)?;

        String::from_utf8(buffer)
            .map_err(|_| VaultError::MalformedInput("plaintext is not UTF-8".to_string()))
    }

    // =========================================================================
    // Credential helpers
    // =========================================================================

    /// Builds a new credential row with every secret encrypted.
    pub fn seal_credential(
        &self,
        dealership_id: DealershipId,
        input: &ValidCredentialInput,
    ) -> Result<Credential, VaultError> {
        let now = Utc::now();
        Ok(Credential {
            id: uuid::Uuid::new_v4().to_string(),
            dealership_id,
            encrypted_client_id: self.encrypt(&input.client_id)?,
            encrypted_client_secret: self.encrypt(&input.client_secret)?,
            encrypted_account_number: self.encrypt(&input.account_number)?,
            encrypted_account_secret: self.encrypt(&input.account_secret)?,
            environment: input.environment,
            yard_code: input.yard_code.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Re-encrypts an existing credential with new values, keeping its id.
    pub fn reseal_credential(
        &self,
        existing: &Credential,
        input: &ValidCredentialInput,
    ) -> Result<Credential, VaultError> {
        let mut sealed = self.seal_credential(existing.dealership_id, input)?;
        sealed.id = existing.id.clone();
        sealed.created_at = existing.created_at;
        Ok(sealed)
    }

    /// Decrypts the four secrets of a stored credential.
    pub fn open_credential(&self, credential: &Credential) -> Result<AccountCredentials, VaultError> {
        Ok(AccountCredentials {
            client_id: self.decrypt(&credential.encrypted_client_id)?,
            client_secret: self.decrypt(&credential.encrypted_client_secret)?,
            account_number: self.decrypt(&credential.encrypted_account_number)?,
            account_secret: self.decrypt(&credential.encrypted_account_secret)?,
            environment: credential.environment,
            yard_code: credential.yard_code.clone(),
        })
    }
}
