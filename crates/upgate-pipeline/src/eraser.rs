//! Secure deletion of plaintext uploads.
//!
//! A file is overwritten in place, block by block, with fresh random bytes
//! covering its full length, synced, closed, and only then unlinked. If any
//! block fails the handle is still closed and an unlink is still attempted
//! before the failure is reported, so a half-overwritten file is never left
//! behind without at least one removal attempt.
//!
//! Erasure of one file is sequential. Distinct paths can be erased
//! concurrently.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, error, info, trace, warn};
use upgate_core::defaults::ERASE_BLOCK_SIZE;
use upgate_core::IoFailureKind;
use upgate_crypto::{try_fill_random, CryptoResult};

/// Source of overwrite bytes.
pub trait EntropySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> CryptoResult<()>;
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> CryptoResult<()> {
        try_fill_random(buf)
    }
}

/// Successful result of an erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EraseOutcome {
    /// The file was overwritten (and unlinked, for `secure_delete`).
    Erased { bytes: u64, blocks: u64 },
    /// The path did not exist.
    NothingToDelete,
}

/// Why an overwrite pass stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverwriteFailure {
    /// The random source failed to produce a block.
    RandomSource(String),
    /// Seeking or writing the block failed.
    Write(IoFailureKind, String),
    /// Flushing the overwritten content to the device failed.
    Sync(IoFailureKind, String),
}

impl OverwriteFailure {
    pub fn kind(&self) -> IoFailureKind {
        match self {
            OverwriteFailure::RandomSource(_) => IoFailureKind::Other,
            OverwriteFailure::Write(kind, _) | OverwriteFailure::Sync(kind, _) => *kind,
        }
    }
}

impl std::fmt::Display for OverwriteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverwriteFailure::RandomSource(msg) => write!(f, "random source failed: {}", msg),
            OverwriteFailure::Write(kind, msg) => write!(f, "write failed ({}): {}", kind, msg),
            OverwriteFailure::Sync(kind, msg) => write!(f, "sync failed ({}): {}", kind, msg),
        }
    }
}

/// Secure deletion errors.
#[derive(Error, Debug)]
pub enum EraseError {
    /// The file exists but could not be opened or inspected.
    #[error("cannot open {path} for erasure ({kind}): {source}")]
    Open {
        path: PathBuf,
        kind: IoFailureKind,
        #[source]
        source: std::io::Error,
    },

    /// The path is not a regular file.
    #[error("{path} is not a regular file")]
    NotAFile { path: PathBuf },

    /// An overwrite pass failed part-way. `unlinked` reports whether the
    /// cleanup unlink that followed succeeded.
    #[error("overwrite of {path} failed at block {block}: {failure} (unlinked: {unlinked})")]
    Overwrite {
        path: PathBuf,
        block: u64,
        failure: OverwriteFailure,
        unlinked: bool,
    },

    /// Overwrite completed but the unlink failed.
    #[error("cannot unlink {path} ({kind}): {source}")]
    Unlink {
        path: PathBuf,
        kind: IoFailureKind,
        #[source]
        source: std::io::Error,
    },
}

impl EraseError {
    pub fn kind(&self) -> IoFailureKind {
        match self {
            EraseError::Open { kind, .. } | EraseError::Unlink { kind, .. } => *kind,
            EraseError::NotAFile { .. } => IoFailureKind::Other,
            EraseError::Overwrite { failure, .. } => failure.kind(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            EraseError::Open { path, .. }
            | EraseError::NotAFile { path }
            | EraseError::Overwrite { path, .. }
            | EraseError::Unlink { path, .. } => path,
        }
    }
}

/// Overwrites files with random data before unlinking them.
#[derive(Clone)]
pub struct SecureEraser {
    block_size: usize,
    entropy: Arc<dyn EntropySource>,
}

impl std::fmt::Debug for SecureEraser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureEraser")
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl Default for SecureEraser {
    fn default() -> Self {
        Self::new(ERASE_BLOCK_SIZE)
    }
}

impl SecureEraser {
    /// Eraser using the OS CSPRNG. A zero block size falls back to the default.
    pub fn new(block_size: usize) -> Self {
        Self::with_entropy(block_size, Arc::new(OsEntropy))
    }

    pub fn with_entropy(block_size: usize, entropy: Arc<dyn EntropySource>) -> Self {
        let block_size = if block_size == 0 {
            ERASE_BLOCK_SIZE
        } else {
            block_size
        };
        Self {
            block_size,
            entropy,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks needed to cover `len` bytes.
    pub fn block_count(&self, len: u64) -> u64 {
        len.div_ceil(self.block_size as u64)
    }

    /// Overwrite `path` with random data, then unlink it.
    ///
    /// A missing path is `Ok(EraseOutcome::NothingToDelete)`, distinguishable
    /// from both success and failure.
    pub async fn secure_delete(&self, path: &Path) -> Result<EraseOutcome, EraseError> {
        let start = Instant::now();
        let Some((mut file, len)) = open_target(path).await? else {
            info!(
                subsystem = "erase",
                op = "secure_delete",
                path = %path.display(),
                "Nothing to delete"
            );
            return Ok(EraseOutcome::NothingToDelete);
        };

        let result = self.overwrite_file(&mut file, len).await;
        // Close before unlinking on every path.
        drop(file);

        match result {
            Ok(blocks) => {
                fs::remove_file(path).await.map_err(|e| {
                    let kind = IoFailureKind::classify(&e);
                    error!(
                        subsystem = "erase",
                        op = "unlink",
                        path = %path.display(),
                        failure_kind = %kind,
                        error = %e,
                        "Overwritten file could not be unlinked"
                    );
                    EraseError::Unlink {
                        path: path.to_path_buf(),
                        kind,
                        source: e,
                    }
                })?;
                info!(
                    subsystem = "erase",
                    op = "secure_delete",
                    path = %path.display(),
                    size_bytes = len,
                    blocks,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "File securely deleted"
                );
                Ok(EraseOutcome::Erased { bytes: len, blocks })
            }
            Err((block, failure)) => {
                let unlinked = match fs::remove_file(path).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            subsystem = "erase",
                            op = "cleanup_unlink",
                            path = %path.display(),
                            error = %e,
                            "Cleanup unlink after failed overwrite also failed"
                        );
                        false
                    }
                };
                error!(
                    subsystem = "erase",
                    op = "secure_delete",
                    path = %path.display(),
                    block,
                    failure_kind = %failure.kind(),
                    error = %failure,
                    unlinked,
                    "Overwrite failed"
                );
                Err(EraseError::Overwrite {
                    path: path.to_path_buf(),
                    block,
                    failure,
                    unlinked,
                })
            }
        }
    }

    /// Overwrite `path` in place without unlinking it.
    ///
    /// Lets a harness inspect the freed blocks before removal.
    pub async fn overwrite(&self, path: &Path) -> Result<EraseOutcome, EraseError> {
        let Some((mut file, len)) = open_target(path).await? else {
            return Ok(EraseOutcome::NothingToDelete);
        };
        let result = self.overwrite_file(&mut file, len).await;
        drop(file);
        match result {
            Ok(blocks) => Ok(EraseOutcome::Erased { bytes: len, blocks }),
            Err((block, failure)) => Err(EraseError::Overwrite {
                path: path.to_path_buf(),
                block,
                failure,
                unlinked: false,
            }),
        }
    }

    /// Write one random block per index, then sync. Returns the block count,
    /// or the failing block index and cause.
    async fn overwrite_file(
        &self,
        file: &mut File,
        len: u64,
    ) -> Result<u64, (u64, OverwriteFailure)> {
        let blocks = self.block_count(len);
        let mut buf = vec![0u8; self.block_size];

        for block in 0..blocks {
            let offset = block * self.block_size as u64;
            // The last block is cut to the file length so the file never grows.
            let n = (len - offset).min(self.block_size as u64) as usize;
            let chunk = &mut buf[..n];

            self.entropy
                .fill(chunk)
                .map_err(|e| (block, OverwriteFailure::RandomSource(e.to_string())))?;

            write_block(file, offset, chunk)
                .await
                .map_err(|e| (block, io_failure(OverwriteFailure::Write, &e)))?;

            trace!(subsystem = "erase", op = "block", block, offset, len = n, "Block overwritten");
        }

        file.sync_all()
            .await
            .map_err(|e| (blocks, io_failure(OverwriteFailure::Sync, &e)))?;

        debug!(subsystem = "erase", op = "overwrite", size_bytes = len, blocks, "Overwrite pass complete");
        Ok(blocks)
    }
}

async fn write_block(file: &mut File, offset: u64, chunk: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(chunk).await?;
    // tokio buffers writes; flush so this block's error is reported here.
    file.flush().await
}

fn io_failure(
    ctor: fn(IoFailureKind, String) -> OverwriteFailure,
    err: &std::io::Error,
) -> OverwriteFailure {
    ctor(IoFailureKind::classify(err), err.to_string())
}

/// Open an existing regular file for in-place overwrite.
///
/// `Ok(None)` when the path does not exist.
async fn open_target(path: &Path) -> Result<Option<(File, u64)>, EraseError> {
    let file = match OpenOptions::new().read(true).write(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(EraseError::Open {
                path: path.to_path_buf(),
                kind: IoFailureKind::classify(&e),
                source: e,
            })
        }
    };

    let meta = file.metadata().await.map_err(|e| EraseError::Open {
        path: path.to_path_buf(),
        kind: IoFailureKind::classify(&e),
        source: e,
    })?;
    if !meta.is_file() {
        return Err(EraseError::NotAFile {
            path: path.to_path_buf(),
        });
    }
    Ok(Some((file, meta.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::tempdir;

    /// Fails on the nth fill call (0-based).
    struct FailingEntropy {
        fail_at: u64,
        calls: AtomicU64,
    }

    impl EntropySource for FailingEntropy {
        fn fill(&self, buf: &mut [u8]) -> CryptoResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_at {
                return Err(upgate_crypto::CryptoError::RandomSource(
                    "entropy pool exhausted".into(),
                ));
            }
            buf.fill(0xA5);
            Ok(())
        }
    }

    #[test]
    fn test_block_count() {
        let eraser = SecureEraser::new(4096);
        assert_eq!(eraser.block_count(0), 0);
        assert_eq!(eraser.block_count(1), 1);
        assert_eq!(eraser.block_count(4096), 1);
        assert_eq!(eraser.block_count(4097), 2);
        assert_eq!(eraser.block_count(3 * 4096), 3);
    }

    #[test]
    fn test_zero_block_size_falls_back() {
        assert_eq!(SecureEraser::new(0).block_size(), ERASE_BLOCK_SIZE);
    }

    #[tokio::test]
    async fn test_secure_delete_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, vec![7u8; 10_000]).unwrap();

        let outcome = SecureEraser::new(4096).secure_delete(&path).await.unwrap();
        assert_eq!(
            outcome,
            EraseOutcome::Erased {
                bytes: 10_000,
                blocks: 3
            }
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_secure_delete_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let outcome = SecureEraser::default().secure_delete(&path).await.unwrap();
        assert_eq!(outcome, EraseOutcome::Erased { bytes: 0, blocks: 0 });
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_nothing_to_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never-existed.bin");

        let eraser = SecureEraser::default();
        assert_eq!(
            eraser.secure_delete(&path).await.unwrap(),
            EraseOutcome::NothingToDelete
        );
        // Idempotent on repeat
        assert_eq!(
            eraser.secure_delete(&path).await.unwrap(),
            EraseOutcome::NothingToDelete
        );
    }

    #[tokio::test]
    async fn test_overwrite_keeps_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("odd.bin");
        std::fs::write(&path, vec![0u8; 5000]).unwrap();

        SecureEraser::new(4096).overwrite(&path).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 5000);
    }

    #[tokio::test]
    async fn test_random_failure_still_unlinks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.bin");
        std::fs::write(&path, vec![1u8; 4 * 512]).unwrap();

        let entropy = Arc::new(FailingEntropy {
            fail_at: 2,
            calls: AtomicU64::new(0),
        });
        let eraser = SecureEraser::with_entropy(512, entropy);

        let err = eraser.secure_delete(&path).await.unwrap_err();
        match &err {
            EraseError::Overwrite {
                block,
                failure,
                unlinked,
                ..
            } => {
                assert_eq!(*block, 2);
                assert!(matches!(failure, OverwriteFailure::RandomSource(_)));
                assert!(*unlinked);
            }
            other => panic!("expected overwrite failure, got {other:?}"),
        }
        assert_eq!(err.kind(), IoFailureKind::Other);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let err = SecureEraser::default()
            .secure_delete(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EraseError::NotAFile { .. } | EraseError::Open { .. }
        ));
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_distinct_paths() {
        let dir = tempdir().unwrap();
        let eraser = SecureEraser::new(1024);
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let path = dir.path().join(format!("f{}.bin", i));
            std::fs::write(&path, vec![i as u8; 3000 + i * 100]).unwrap();
            let eraser = eraser.clone();
            tasks.spawn(async move { eraser.secure_delete(&path).await.map(|o| (path, o)) });
        }
        while let Some(joined) = tasks.join_next().await {
            let (path, outcome) = joined.unwrap().unwrap();
            assert!(matches!(outcome, EraseOutcome::Erased { .. }));
            assert!(!path.exists());
        }
    }
}
