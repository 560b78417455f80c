//! Credential encryption for feed passwords.
//!
//! Source passwords are never written to the configuration file in plain
//! text. They are sealed with AES-256-GCM under a key derived (PBKDF2-SHA256)
//! from a passphrase the user keeps outside the file, usually in the
//! `FEEDCTL_CREDENTIAL_KEY` environment variable.
//!
//! ## Usage
//!
//! ```
//! use feedctl_encrypt::{decrypt_secret, encrypt_secret};
//!
//! let sealed = encrypt_secret("hunter2", "machine-passphrase").expect("encrypt");
//! let opened = decrypt_secret(&sealed, "machine-passphrase").expect("decrypt");
//!
//! assert_eq!(opened, "hunter2");
//! ```
//!
//! ## Format
//!
//! `base64(salt || nonce || ciphertext || auth_tag)`, with a fresh random
//! salt and nonce per call.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use pbkdf2::pbkdf2_hmac_array;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Environment variable consulted when no other passphrase source is configured.
pub const DEFAULT_PASSPHRASE_ENV: &str = "FEEDCTL_CREDENTIAL_KEY";

const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_SIZE: usize = 32;

/// Where the credential passphrase comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Literal passphrase. Intended for tests and throwaway setups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Environment variable to read the passphrase from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl EncryptionConfig {
    pub fn from_env(env_var: impl Into<String>) -> Self {
        Self {
            passphrase: None,
            env_var: Some(env_var.into()),
        }
    }

    /// Name of the environment variable that will be read.
    pub fn env_var_name(&self) -> &str {
        self.env_var.as_deref().unwrap_or(DEFAULT_PASSPHRASE_ENV)
    }

    /// Resolve the passphrase. The environment wins over a literal value so a
    /// checked-in config can be overridden per machine. Blank values count as unset.
    pub fn passphrase(&self) -> Option<String> {
        if let Ok(value) = std::env::var(self.env_var_name())
            && !value.trim().is_empty()
        {
            return Some(value);
        }

        self.passphrase
            .as_ref()
            .filter(|p| !p.trim().is_empty())
            .cloned()
    }
}

/// Seals credentials with a resolved passphrase.
#[derive(Debug, Clone)]
pub struct CredentialCipher {
    config: EncryptionConfig,
}

impl CredentialCipher {
    pub fn new(config: EncryptionConfig) -> Self {
        Self { config }
    }

    /// Encrypt a secret for storage.
    pub fn seal(&self, secret: &str) -> Result<String> {
        let passphrase = self.config.passphrase().with_context(|| {
            format!(
                "no credential passphrase available; set {} to store passwords",
                self.config.env_var_name()
            )
        })?;
        encrypt_secret(secret, &passphrase)
    }
}

/// Encrypt `secret` and return the base64 blob.
pub fn encrypt_secret(secret: &str, passphrase: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new_from_slice(&key).context("failed to create AES-256-GCM cipher")?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("encryption failed: {e:?}"))?;

    let mut sealed = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&sealed))
}

/// Decrypt a blob produced by [`encrypt_secret`].
pub fn decrypt_secret(sealed: &str, passphrase: &str) -> Result<String> {
    let data = BASE64
        .decode(sealed.trim())
        .context("stored credential is not valid base64")?;

    if data.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
        bail!("stored credential is too short to be encrypted");
    }

    let (salt, rest) = data.split_at(SALT_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    let key = derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new_from_slice(&key).context("failed to create AES-256-GCM cipher")?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| anyhow::anyhow!("failed to decrypt credential: wrong passphrase or corrupted value"))?;

    String::from_utf8(plaintext).context("decrypted credential is not valid UTF-8")
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; KEY_SIZE] {
    pbkdf2_hmac_array::<Sha256, KEY_SIZE>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS)
}
