//! Message encryption.
//!
//! Message bodies are encrypted with AES-256-GCM before they are stored by
//! the chat backend. The key for a message is `SHA-256(master_key || secret)`
//! where the secret is the id of the group the message belongs to.
//!
//! Ciphertext format: `enc.` followed by base64 of `nonce(12) || ciphertext`.
//!
//! Without a master key the service refuses to encrypt or decrypt with
//! `SERVICE_UNAVAILABLE` until a key is posted to `/messages/key`.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::sync::RwLock;

use crate::error::{ApiError, ApiResult};

/// Prefix that marks an encrypted message body.
pub const ENCRYPTED_PREFIX: &str = "enc.";

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts message bodies and owns the master key.
pub trait MessageEncryption: Send + Sync {
    fn encrypt(&self, message: &str, secret: &str) -> ApiResult<String>;

    /// Decrypt a message body. Bodies without [`ENCRYPTED_PREFIX`] are
    /// returned unchanged.
    fn decrypt(&self, message: &str, secret: &str) -> ApiResult<String>;

    /// Replace the master key. Returns `false` if the key was already set to
    /// this value.
    fn update_master_key(&self, master_key: &str) -> ApiResult<bool>;
}

/// AES-256-GCM implementation of [`MessageEncryption`].
pub struct AesEncryptionService {
    master_key: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for AesEncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesEncryptionService")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

impl AesEncryptionService {
    /// Service with `master_key`. A blank key counts as no key.
    pub fn new(master_key: SecretString) -> Self {
        let master_key = Some(master_key).filter(|k| !k.expose_secret().trim().is_empty());
        Self {
            master_key: RwLock::new(master_key),
        }
    }

    /// Service that waits for a key from `/messages/key`.
    pub fn without_key() -> Self {
        Self {
            master_key: RwLock::new(None),
        }
    }

    pub fn has_master_key(&self) -> bool {
        self.master_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn cipher(&self, secret: &str) -> ApiResult<Aes256Gcm> {
        let guard = self.master_key.read().unwrap_or_else(|e| e.into_inner());
        let Some(master_key) = guard.as_ref() else {
            return Err(ApiError::service_unavailable(
                "No encryption master key configured",
            ));
        };
        let mut hasher = Sha256::new();
        hasher.update(master_key.expose_secret().as_bytes());
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest)))
    }
}

impl MessageEncryption for AesEncryptionService {
    fn encrypt(&self, message: &str, secret: &str) -> ApiResult<String> {
        let cipher = self.cipher(secret)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, message.as_bytes())
            .map_err(|e| ApiError::encryption_failed(format!("Encryption failed: {}", e)))?;

        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(payload)))
    }

    fn decrypt(&self, message: &str, secret: &str) -> ApiResult<String> {
        let Some(encoded) = message.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(message.to_string());
        };

        let payload = BASE64
            .decode(encoded)
            .map_err(|_| ApiError::encryption_failed("Encrypted message is not valid base64"))?;

        if payload.len() < NONCE_LEN {
            return Err(ApiError::encryption_failed(
                "Encrypted message is too short",
            ));
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher(secret)?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| ApiError::encryption_failed("Message could not be decrypted"))?;

        String::from_utf8(plaintext)
            .map_err(|_| ApiError::encryption_failed("Decrypted message is not valid UTF-8"))
    }

    fn update_master_key(&self, master_key: &str) -> ApiResult<bool> {
        let mut guard = self.master_key.write().unwrap_or_else(|e| e.into_inner());
        if guard
            .as_ref()
            .is_some_and(|current| current.expose_secret() == master_key)
        {
            return Ok(false);
        }
        *guard = Some(SecretString::new(master_key.to_string().into()));
        tracing::info!("Encryption master key updated");
        Ok(true)
    }
}
