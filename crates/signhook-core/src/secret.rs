//! Shared-secret resolution for callback authentication.
//!
//! The Dropbox Sign API key doubles as the HMAC key for callbacks. It is kept
//! at rest as an AES-256-GCM sealed value and only opened when a callback
//! needs to be checked, so a key rotation takes effect on the next request.
//!
//! Sealed format: base64 (standard alphabet) of `nonce (12 bytes) ||
//! ciphertext || tag`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use tracing::warn;
use zeroize::Zeroizing;

use crate::error::SecretError;

/// Required length of the master key in bytes.
pub const MASTER_KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// Secret material that is wiped from memory on drop.
pub type SecretBytes = Zeroizing<Vec<u8>>;

/// Supplies the shared secret used to verify callback hashes.
///
/// Returning `None` means "no usable secret"; callers must then reject every
/// signed callback rather than fall back to some default key.
#[async_trait::async_trait]
pub trait SecretResolver: Send + Sync + std::fmt::Debug {
    /// Resolves the current secret.
    async fn resolve_secret(&self) -> Option<SecretBytes>;
}

/// Encrypts `plaintext` under `master_key` and returns the sealed string.
///
/// # Errors
///
/// Returns `SecretError::InvalidKey` if the key is not 32 bytes.
pub fn seal_secret(master_key: &[u8], plaintext: &[u8]) -> Result<String, SecretError> {
    let cipher = cipher(master_key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| SecretError::Encryption)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(sealed))
}

/// Decrypts a value produced by [`seal_secret`].
///
/// # Errors
///
/// Returns `SecretError::Malformed` for bad base64 or truncated input and
/// `SecretError::Decryption` when the key is wrong or the value was altered.
pub fn open_secret(master_key: &[u8], sealed: &str) -> Result<SecretBytes, SecretError> {
    let cipher = cipher(master_key)?;

    let bytes = STANDARD.decode(sealed.trim()).map_err(|e| SecretError::Malformed(e.to_string()))?;
    if bytes.len() <= NONCE_LEN {
        return Err(SecretError::Malformed(format!(
            "sealed value is {} bytes, shorter than nonce plus tag",
            bytes.len()
        )));
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| SecretError::Decryption)
}

fn cipher(master_key: &[u8]) -> Result<Aes256Gcm, SecretError> {
    Aes256Gcm::new_from_slice(master_key)
        .map_err(|_| SecretError::InvalidKey { expected: MASTER_KEY_LEN, actual: master_key.len() })
}

/// Opens a sealed secret from configuration on every call.
pub struct SealedSecretResolver {
    master_key: Zeroizing<Vec<u8>>,
    sealed: Option<String>,
}

impl SealedSecretResolver {
    /// Creates a resolver for `sealed`, which may be unset.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::InvalidKey` if the master key is not 32 bytes,
    /// so a misconfigured key fails at start-up instead of on every callback.
    pub fn new(master_key: &[u8], sealed: Option<String>) -> Result<Self, SecretError> {
        if master_key.len() != MASTER_KEY_LEN {
            return Err(SecretError::InvalidKey {
                expected: MASTER_KEY_LEN,
                actual: master_key.len(),
            });
        }

        let sealed = sealed.filter(|s| !s.trim().is_empty());
        Ok(Self { master_key: Zeroizing::new(master_key.to_vec()), sealed })
    }

    /// Whether a sealed value is present. Says nothing about whether it opens.
    pub fn is_configured(&self) -> bool {
        self.sealed.is_some()
    }
}

impl std::fmt::Debug for SealedSecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedSecretResolver")
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl SecretResolver for SealedSecretResolver {
    async fn resolve_secret(&self) -> Option<SecretBytes> {
        let sealed = self.sealed.as_deref()?;

        match open_secret(&self.master_key, sealed) {
            Ok(secret) if secret.is_empty() => None,
            Ok(secret) => Some(secret),
            Err(e) => {
                warn!(error = %e, "configured API secret could not be opened");
                None
            },
        }
    }
}

/// Resolver with a fixed, already decrypted secret.
///
/// Useful in development and tests where no sealed configuration exists.
#[derive(Clone, Default)]
pub struct StaticSecretResolver {
    secret: Option<Zeroizing<Vec<u8>>>,
}

impl StaticSecretResolver {
    /// Creates a resolver that always yields `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: Some(Zeroizing::new(secret.into())) }
    }

    /// Creates a resolver with no secret configured.
    pub fn unset() -> Self {
        Self { secret: None }
    }
}

impl std::fmt::Debug for StaticSecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSecretResolver").field("configured", &self.secret.is_some()).finish()
    }
}

#[async_trait::async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve_secret(&self) -> Option<SecretBytes> {
        self.secret.as_ref().filter(|s| !s.is_empty()).map(|s| Zeroizing::new(s.to_vec()))
    }
}
