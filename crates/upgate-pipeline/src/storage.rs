//! Staging area for raw uploads and the encrypted artifact store.
//!
//! Both are plain directories. Staged files are named by a random token so
//! the claimed filename never reaches the filesystem. Artifacts are written
//! atomically: temp file, sync, restrictive permissions, rename.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use upgate_core::defaults::TOKEN_BYTES;
use upgate_core::IoFailureKind;
use upgate_crypto::{generate_token, EncryptedArtifact};

/// Filesystem failure in the staging area or artifact store.
#[derive(Error, Debug)]
#[error("{op} {path} failed ({kind}): {source}")]
pub struct StorageError {
    pub op: &'static str,
    pub path: PathBuf,
    pub kind: IoFailureKind,
    #[source]
    pub source: std::io::Error,
}

impl StorageError {
    fn new(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        let kind = IoFailureKind::classify(&source);
        warn!(
            subsystem = "storage",
            op,
            path = %path.display(),
            failure_kind = %kind,
            error = %source,
            "Storage operation failed"
        );
        Self {
            op,
            path: path.to_path_buf(),
            kind,
            source,
        }
    }

    /// False when the failure happened before this process created the file,
    /// in which case the path must not be erased.
    pub fn created_file(&self) -> bool {
        !matches!(self.op, "create_dir_all" | "create")
    }
}

/// An encrypted upload at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    /// Final location under the storage root.
    pub path: PathBuf,
    /// Random token naming the artifact.
    pub token: String,
    /// Claimed extension including the dot, or empty.
    pub extension: String,
    pub plaintext_len: u64,
    /// Bytes on disk (nonce, ciphertext and tag).
    pub stored_len: u64,
    pub stored_at: DateTime<Utc>,
}

/// Directory holding raw uploads until they are stored or erased.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A fresh, unused path inside the staging directory.
    pub fn allocate(&self) -> PathBuf {
        self.dir
            .join(format!("{}.upload", generate_token::<TOKEN_BYTES>()))
    }

    /// Write raw bytes to a newly allocated path.
    ///
    /// The file is created exclusively with owner-only permissions. On error
    /// a partial file may remain at `path`; the caller must erase it.
    pub async fn write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::new("create_dir_all", &self.dir, e))?;

        let mut file = create_exclusive(path)
            .await
            .map_err(|e| StorageError::new("create", path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| StorageError::new("write", path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::new("sync", path, e))?;

        debug!(subsystem = "storage", op = "stage", path = %path.display(), size_bytes = data.len(), "Upload staged");
        Ok(())
    }
}

/// Directory of encrypted artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist an artifact as `<root>/<token><extension>`.
    ///
    /// Nothing is visible at the final path until the content has been
    /// synced. A failed write removes its temp file.
    pub async fn write(
        &self,
        artifact: &EncryptedArtifact,
        extension: &str,
    ) -> Result<StoredArtifact, StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::new("create_dir_all", &self.root, e))?;

        let token = generate_token::<TOKEN_BYTES>();
        let final_path = self.root.join(format!("{}{}", token, extension));
        let temp_path = self.root.join(format!(".{}.tmp", token));
        let bytes = artifact.to_bytes();

        if let Err(e) = write_synced(&temp_path, &bytes).await {
            let _ = fs::remove_file(&temp_path).await; // Best-effort cleanup
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::new("rename", &final_path, e));
        }

        debug!(
            subsystem = "storage",
            op = "write_artifact",
            path = %final_path.display(),
            size_bytes = bytes.len(),
            "Artifact stored"
        );

        Ok(StoredArtifact {
            path: final_path,
            token,
            extension: extension.to_string(),
            plaintext_len: artifact.plaintext_len() as u64,
            stored_len: bytes.len() as u64,
            stored_at: Utc::now(),
        })
    }

    /// Read a stored artifact back.
    pub async fn read(&self, path: &Path) -> Result<EncryptedArtifact, StorageError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| StorageError::new("read", path, e))?;
        EncryptedArtifact::from_bytes(&bytes).map_err(|e| StorageError {
            op: "parse",
            path: path.to_path_buf(),
            kind: IoFailureKind::Other,
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        })
    }

    /// Validate that the store can write, read, and delete files.
    ///
    /// Run at startup to surface permission and mount problems early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.root.join(".health-check");
        let test_file = test_dir.join("probe.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"upgate-storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = create_exclusive(path)
        .await
        .map_err(|e| StorageError::new("create", path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| StorageError::new("write", path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::new("sync", path, e))?;
    Ok(())
}

/// Create a new file, failing if it exists. Owner read/write only on unix.
async fn create_exclusive(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).await
}
