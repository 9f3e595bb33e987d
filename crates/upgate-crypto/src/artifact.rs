//! Encrypted artifact format.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Nonce (12 bytes, random per artifact)    │
//! ├──────────────────────────────────────────┤
//! │ Ciphertext (same length as plaintext)    │
//! ├──────────────────────────────────────────┤
//! │ Authentication tag (16 bytes)            │
//! └──────────────────────────────────────────┘
//! ```
//!
//! There is no header and no key identifier: the key is process-wide
//! configuration and never travels with the artifact.

use crate::cipher::{aes_gcm_decrypt, aes_gcm_encrypt, generate_nonce, NONCE_LEN, TAG_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;

/// Nonce plus authenticated ciphertext for one stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArtifact {
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedArtifact {
    /// Serialize as `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse `nonce || ciphertext`.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::InvalidFormat(format!(
                "artifact too short: {} bytes",
                bytes.len()
            )));
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }

    /// Length of the plaintext this artifact decrypts to.
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_LEN)
    }

    /// Total serialized length.
    pub fn encoded_len(&self) -> usize {
        NONCE_LEN + self.ciphertext.len()
    }
}

/// Encrypts accepted uploads under the process-wide key.
#[derive(Debug, Clone)]
pub struct ArtifactCipher {
    key: EncryptionKey,
}

impl ArtifactCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypt with a freshly generated nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<EncryptedArtifact> {
        let nonce = generate_nonce();
        let ciphertext = aes_gcm_encrypt(self.key.as_bytes(), &nonce, plaintext)?;
        Ok(EncryptedArtifact { nonce, ciphertext })
    }

    /// Decrypt and authenticate. Fails on a wrong key or tampered bytes.
    pub fn decrypt(&self, artifact: &EncryptedArtifact) -> CryptoResult<Vec<u8>> {
        aes_gcm_decrypt(self.key.as_bytes(), &artifact.nonce, &artifact.ciphertext)
    }

    /// Decrypt serialized artifact bytes.
    pub fn decrypt_bytes(&self, bytes: &[u8]) -> CryptoResult<Vec<u8>> {
        self.decrypt(&EncryptedArtifact::from_bytes(bytes)?)
    }
}
