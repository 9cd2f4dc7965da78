//! AES-256-GCM encryption of block entry lists
//!
//! Ciphertext, IV and authentication tag are stored as separate base64 fields.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroize;

use crate::config::AuditConfig;
use crate::error::{AuditError, AuditResult};

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypted form of a block's entry list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub data: String,
    pub iv: String,
    pub auth_tag: String,
}

/// Process-wide cipher for block payloads
pub struct EntryCipher {
    key: [u8; KEY_LEN],
}

impl Drop for EntryCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for EntryCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryCipher").finish_non_exhaustive()
    }
}

impl EntryCipher {
    /// Use caller-provided key material
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Derive the key from a passphrase and salt with Argon2id
    pub fn derive(passphrase: &str, salt: &str, memory_kib: u32, iterations: u32) -> AuditResult<Self> {
        let params = Params::new(memory_kib, iterations, 1, Some(KEY_LEN))
            .map_err(|e| AuditError::CryptoError(format!("Invalid KDF parameters: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut key)
            .map_err(|e| AuditError::CryptoError(format!("Key derivation failed: {}", e)))?;

        debug!("Derived block encryption key");
        Ok(Self { key })
    }

    pub fn from_config(config: &AuditConfig) -> AuditResult<Self> {
        Self::derive(
            &config.key_passphrase,
            &config.key_salt,
            config.kdf_memory_kib,
            config.kdf_iterations,
        )
    }

    fn cipher(&self) -> AuditResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| AuditError::CryptoError("Invalid key length".to_string()))
    }

    /// Encrypt plaintext with a fresh random IV
    pub fn encrypt(&self, plaintext: &[u8]) -> AuditResult<EncryptedPayload> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut sealed = self
            .cipher()?
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| AuditError::CryptoError("Encryption failed".to_string()))?;

        // aes-gcm appends the tag to the ciphertext
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(EncryptedPayload {
            data: STANDARD.encode(&sealed),
            iv: STANDARD.encode(iv),
            auth_tag: STANDARD.encode(tag),
        })
    }

    /// Decrypt and authenticate a payload
    pub fn decrypt(&self, payload: &EncryptedPayload) -> AuditResult<Vec<u8>> {
        let decode = |field: &str, value: &str| {
            STANDARD
                .decode(value)
                .map_err(|e| AuditError::CryptoError(format!("Invalid base64 in {}: {}", field, e)))
        };

        let iv = decode("iv", &payload.iv)?;
        let tag = decode("authTag", &payload.auth_tag)?;
        let mut data = decode("data", &payload.data)?;

        if iv.len() != IV_LEN {
            return Err(AuditError::CryptoError(format!(
                "IV must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            )));
        }
        if tag.len() != TAG_LEN {
            return Err(AuditError::CryptoError(format!(
                "Auth tag must be {} bytes, got {}",
                TAG_LEN,
                tag.len()
            )));
        }

        data.extend_from_slice(&tag);
        self.cipher()?
            .decrypt(Nonce::from_slice(&iv), data.as_slice())
            .map_err(|_| AuditError::CryptoError("Decryption failed (wrong key or tampered data)".to_string()))
    }
}
