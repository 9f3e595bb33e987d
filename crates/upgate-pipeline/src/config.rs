//! Pipeline configuration from the environment.

use std::path::PathBuf;

use upgate_core::defaults::{
    ENV_ENCRYPTION_KEY, ENV_ERASE_BLOCK_SIZE, ENV_KEY_FILE, ENV_MAX_UPLOAD_BYTES,
    ENV_STAGING_DIR, ENV_STORAGE_ROOT, ERASE_BLOCK_SIZE, ERASE_BLOCK_SIZE_MAX,
    ERASE_BLOCK_SIZE_MIN, MAX_UPLOAD_SIZE_BYTES, STAGING_DIR, STORAGE_ROOT,
};
use upgate_core::{Error, Result};
use upgate_crypto::EncryptionKey;

/// Runtime settings for an [`UploadPipeline`](crate::UploadPipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub staging_dir: PathBuf,
    pub storage_root: PathBuf,
    pub max_upload_bytes: u64,
    pub erase_block_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(STAGING_DIR),
            storage_root: PathBuf::from(STORAGE_ROOT),
            max_upload_bytes: MAX_UPLOAD_SIZE_BYTES,
            erase_block_size: ERASE_BLOCK_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Read settings from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            staging_dir: lookup(ENV_STAGING_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            storage_root: lookup(ENV_STORAGE_ROOT)
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            max_upload_bytes: parse_var(&lookup, ENV_MAX_UPLOAD_BYTES)?
                .unwrap_or(defaults.max_upload_bytes),
            erase_block_size: parse_var(&lookup, ENV_ERASE_BLOCK_SIZE)?
                .unwrap_or(defaults.erase_block_size),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(Error::Config(format!(
                "{} must be greater than zero",
                ENV_MAX_UPLOAD_BYTES
            )));
        }
        if !(ERASE_BLOCK_SIZE_MIN..=ERASE_BLOCK_SIZE_MAX).contains(&self.erase_block_size) {
            return Err(Error::Config(format!(
                "{} must be between {} and {}, got {}",
                ENV_ERASE_BLOCK_SIZE, ERASE_BLOCK_SIZE_MIN, ERASE_BLOCK_SIZE_MAX, self.erase_block_size
            )));
        }
        if self.staging_dir == self.storage_root {
            return Err(Error::Config(
                "staging directory and storage root must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load the process-wide key from `UPGATE_ENCRYPTION_KEY`, or from the file
/// named by `UPGATE_KEY_FILE`. There is no fallback key.
pub fn load_encryption_key() -> Result<EncryptionKey> {
    if std::env::var_os(ENV_ENCRYPTION_KEY).is_some() {
        return EncryptionKey::from_env_var(ENV_ENCRYPTION_KEY)
            .map_err(|e| Error::Config(format!("{}: {}", ENV_ENCRYPTION_KEY, e)));
    }
    match std::env::var_os(ENV_KEY_FILE) {
        Some(path) => EncryptionKey::load_keyfile(&PathBuf::from(path))
            .map_err(|e| Error::Config(format!("{}: {}", ENV_KEY_FILE, e))),
        None => Err(Error::Config(format!(
            "no encryption key configured: set {} or {}",
            ENV_ENCRYPTION_KEY, ENV_KEY_FILE
        ))),
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", name, raw))),
    }
}
