//! Process-wide encryption key material.
//!
//! The key is loaded once at startup. Missing or malformed material is a
//! fatal configuration error; there is no fallback key.

use std::path::Path;

use base64::Engine;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher::generate_random;
use crate::error::{CryptoError, CryptoResult};

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Symmetric key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { key: bytes }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            key: generate_random(),
        }
    }

    /// Parse a key encoded as 64 hex characters or as base64.
    ///
    /// Surrounding whitespace is ignored.
    pub fn from_encoded(encoded: &str) -> CryptoResult<Self> {
        let cleaned: Zeroizing<String> =
            Zeroizing::new(encoded.chars().filter(|c| !c.is_whitespace()).collect());
        if cleaned.is_empty() {
            return Err(CryptoError::InvalidKey("key is empty".to_string()));
        }

        let is_hex = cleaned.len() == KEY_LEN * 2 && cleaned.chars().all(|c| c.is_ascii_hexdigit());
        let decoded = if is_hex {
            hex::decode(cleaned.as_str()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?
        } else {
            base64::engine::general_purpose::STANDARD
                .decode(cleaned.as_str())
                .map_err(|_| {
                    CryptoError::InvalidKey(
                        "expected 64 hex characters or base64 encoding".to_string(),
                    )
                })?
        };
        let decoded = Zeroizing::new(decoded);

        Self::from_slice(&decoded)
    }

    fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Read the key from an environment variable.
    pub fn from_env_var(name: &str) -> CryptoResult<Self> {
        let value = Zeroizing::new(
            std::env::var(name)
                .map_err(|_| CryptoError::InvalidKey(format!("{} is not set", name)))?,
        );
        Self::from_encoded(&value)
    }

    /// Load key from keyfile (raw 32 bytes, hex, or base64).
    pub fn load_keyfile(path: &Path) -> CryptoResult<Self> {
        let contents = Zeroizing::new(std::fs::read(path)?);

        if contents.len() == KEY_LEN {
            return Self::from_slice(&contents);
        }

        let text = std::str::from_utf8(&contents)
            .map_err(|_| CryptoError::InvalidKeyfile("not raw, hex or base64".to_string()))?;
        Self::from_encoded(text).map_err(|e| CryptoError::InvalidKeyfile(e.to_string()))
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Hex encoding, for key generation output only.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.key))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
