//! # upgate-crypto
//!
//! At-rest encryption for uploads accepted by the upgate pipeline.
//!
//! ## Cryptographic Primitives
//!
//! - **Symmetric cipher**: AES-256-GCM (counter mode with authentication)
//! - **Nonce**: 96 bits from a CSPRNG, fresh for every artifact
//! - **Key**: one 256-bit process-wide key, loaded at startup, zeroized on drop
//!
//! ## Examples
//!
//! ```rust
//! use upgate_crypto::{ArtifactCipher, EncryptedArtifact, EncryptionKey};
//!
//! let cipher = ArtifactCipher::new(EncryptionKey::generate());
//! let artifact = cipher.encrypt(b"%PDF-1.4 ...").unwrap();
//!
//! let stored = artifact.to_bytes();
//! let restored = cipher.decrypt_bytes(&stored).unwrap();
//! assert_eq!(restored, b"%PDF-1.4 ...");
//! # assert_eq!(EncryptedArtifact::from_bytes(&stored).unwrap(), artifact);
//! ```

pub mod artifact;
pub mod cipher;
pub mod error;
pub mod key;

// Re-export commonly used types
pub use artifact::{ArtifactCipher, EncryptedArtifact};
pub use cipher::{generate_token, try_fill_random, NONCE_LEN, TAG_LEN};
pub use error::{CryptoError, CryptoResult};
pub use key::{EncryptionKey, KEY_LEN};
