//! Upload orchestration.
//!
//! Each upload moves through:
//!
//! ```text
//! Received → Sniffing → Matching ─┬→ Encrypting → Stored
//!                                 ├→ Erasing → RejectedMismatch | RejectedBlocked
//!                                 └→ Erasing → Failed
//! ```
//!
//! A rejected upload is erased before its outcome is returned. Faults are
//! reported as `io_error` outcomes; nothing escapes as a panic or raw error.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use upgate_core::{
    match_extension, sanitize_filename, BlocklistOracle, ContentSniffer, InferSniffer,
    IoFailureKind, UploadCandidate, VerdictReason,
};
use upgate_crypto::{ArtifactCipher, EncryptionKey};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::PipelineConfig;
use crate::eraser::SecureEraser;
use crate::storage::{ArtifactStore, StagingArea, StoredArtifact};

/// Lifecycle state of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Received,
    Sniffing,
    Matching,
    Encrypting,
    Erasing,
    Stored,
    RejectedMismatch,
    RejectedBlocked,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Received => "received",
            UploadState::Sniffing => "sniffing",
            UploadState::Matching => "matching",
            UploadState::Encrypting => "encrypting",
            UploadState::Erasing => "erasing",
            UploadState::Stored => "stored",
            UploadState::RejectedMismatch => "rejected_mismatch",
            UploadState::RejectedBlocked => "rejected_blocked",
            UploadState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Stored
                | UploadState::RejectedMismatch
                | UploadState::RejectedBlocked
                | UploadState::Failed
        )
    }

    /// Terminal state for a verdict.
    pub fn terminal_for(reason: VerdictReason) -> Self {
        match reason {
            VerdictReason::Ok => UploadState::Stored,
            VerdictReason::ExtensionMimeMismatch | VerdictReason::SniffFailed => {
                UploadState::RejectedMismatch
            }
            VerdictReason::BlockedExtension | VerdictReason::TooLarge => {
                UploadState::RejectedBlocked
            }
            VerdictReason::IoError => UploadState::Failed,
        }
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Degraded cleanup that did not change the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// The artifact was stored but the plaintext original could not be erased.
    OriginalNotErased { failure_kind: IoFailureKind },
    /// Best-effort erasure after a fault did not complete.
    CleanupIncomplete { failure_kind: IoFailureKind },
}

/// Result handed back for every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub upload_id: Uuid,
    pub reason: VerdictReason,
    pub state: UploadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<StoredArtifact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PipelineWarning>,
}

impl UploadOutcome {
    fn new(upload_id: Uuid, reason: VerdictReason, state: UploadState) -> Self {
        Self {
            upload_id,
            reason,
            state,
            artifact: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_stored(&self) -> bool {
        self.state == UploadState::Stored
    }

    pub fn http_status(&self) -> u16 {
        self.reason.http_status()
    }

    pub fn message(&self) -> &'static str {
        self.reason.message()
    }
}

/// Logs every state change of one upload.
struct StateTracker {
    upload_id: Uuid,
    state: UploadState,
}

impl StateTracker {
    fn new(upload_id: Uuid) -> Self {
        debug!(upload_id = %upload_id, state = %UploadState::Received, "Upload received");
        Self {
            upload_id,
            state: UploadState::Received,
        }
    }

    fn advance(&mut self, next: UploadState) {
        debug!(
            upload_id = %self.upload_id,
            from = %self.state,
            to = %next,
            "State transition"
        );
        self.state = next;
    }

    fn finish(mut self, reason: VerdictReason, state: UploadState) -> UploadOutcome {
        self.advance(state);
        UploadOutcome::new(self.upload_id, reason, state)
    }
}

/// Sniff, match, then encrypt-and-store or erase.
///
/// Shareable across tasks behind an `Arc`; uploads never contend on locks
/// inside the pipeline.
pub struct UploadPipeline {
    sniffer: Box<dyn ContentSniffer>,
    blocklist: Arc<dyn BlocklistOracle>,
    cipher: ArtifactCipher,
    staging: StagingArea,
    store: ArtifactStore,
    eraser: SecureEraser,
    max_upload_bytes: u64,
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("staging", &self.staging)
            .field("store", &self.store)
            .field("eraser", &self.eraser)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl UploadPipeline {
    pub fn new(
        config: &PipelineConfig,
        key: EncryptionKey,
        blocklist: Arc<dyn BlocklistOracle>,
    ) -> Self {
        Self {
            sniffer: Box::new(InferSniffer::new()),
            blocklist,
            cipher: ArtifactCipher::new(key),
            staging: StagingArea::new(&config.staging_dir),
            store: ArtifactStore::new(&config.storage_root),
            eraser: SecureEraser::new(config.erase_block_size),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Replace the content sniffer.
    pub fn with_sniffer(mut self, sniffer: impl ContentSniffer + 'static) -> Self {
        self.sniffer = Box::new(sniffer);
        self
    }

    /// Replace the eraser.
    pub fn with_eraser(mut self, eraser: SecureEraser) -> Self {
        self.eraser = eraser;
        self
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn cipher(&self) -> &ArtifactCipher {
        &self.cipher
    }

    /// Round-trip check of the storage root. Run once at startup.
    pub async fn validate_storage(&self) -> std::result::Result<(), String> {
        self.store.validate().await
    }

    /// Stage received bytes, then run the pipeline on them.
    pub async fn process_upload(&self, raw_bytes: &[u8], claimed_name: &str) -> UploadOutcome {
        self.run_staged(Uuid::now_v7(), raw_bytes, claimed_name)
            .await
    }

    /// Run the pipeline on bytes already on disk. The file is consumed.
    pub async fn process_candidate(&self, candidate: UploadCandidate) -> UploadOutcome {
        self.run(Uuid::now_v7(), candidate).await
    }

    #[instrument(
        skip(self, upload_id, raw_bytes, claimed_name),
        fields(subsystem = "pipeline", component = "staging", op = "stage", upload_id = %upload_id)
    )]
    async fn run_staged(
        &self,
        upload_id: Uuid,
        raw_bytes: &[u8],
        claimed_name: &str,
    ) -> UploadOutcome {
        let size = raw_bytes.len() as u64;
        if size > self.max_upload_bytes {
            // Nothing has touched the disk yet.
            warn!(
                claimed_name = %sanitize_filename(claimed_name),
                size_bytes = size,
                limit = self.max_upload_bytes,
                reason = %VerdictReason::TooLarge,
                "Upload rejected before staging"
            );
            return StateTracker::new(upload_id)
                .finish(VerdictReason::TooLarge, UploadState::RejectedBlocked);
        }

        let path = self.staging.allocate();
        let candidate = UploadCandidate::new(claimed_name, path, size);
        if let Err(e) = self.staging.write(candidate.path(), raw_bytes).await {
            let tracker = StateTracker::new(upload_id);
            if !e.created_file() {
                error!(failure_kind = %e.kind, error = %e, "Staging failed");
                return tracker.finish(VerdictReason::IoError, UploadState::Failed);
            }
            return self.fail(tracker, &candidate, "stage", e.kind, &e).await;
        }

        self.run(upload_id, candidate).await
    }

    #[instrument(
        skip(self, upload_id, candidate),
        fields(subsystem = "pipeline", component = "orchestrator", op = "process", upload_id = %upload_id)
    )]
    async fn run(&self, upload_id: Uuid, candidate: UploadCandidate) -> UploadOutcome {
        let start = Instant::now();
        let mut tracker = StateTracker::new(upload_id);
        let claimed_name = sanitize_filename(&candidate.claimed_name);

        if candidate.size_bytes > self.max_upload_bytes {
            warn!(
                claimed_name = %claimed_name,
                size_bytes = candidate.size_bytes,
                limit = self.max_upload_bytes,
                "Upload exceeds size limit"
            );
            return self.reject(tracker, &candidate, VerdictReason::TooLarge).await;
        }

        let data = match fs::read(candidate.path()).await {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) => {
                let kind = IoFailureKind::classify(&e);
                return self.fail(tracker, &candidate, "read_candidate", kind, &e).await;
            }
        };
        if data.len() as u64 > self.max_upload_bytes {
            warn!(claimed_name = %claimed_name, size_bytes = data.len(), "Upload exceeds size limit");
            return self.reject(tracker, &candidate, VerdictReason::TooLarge).await;
        }

        tracker.advance(UploadState::Sniffing);
        let sniff = self.sniffer.sniff(&data);

        tracker.advance(UploadState::Matching);
        let blocked = match self.blocklist.snapshot().await {
            Ok(set) => set,
            Err(e) => {
                return self
                    .fail(tracker, &candidate, "blocklist_lookup", IoFailureKind::Other, &e)
                    .await;
            }
        };
        let reason = match_extension(&candidate.claimed_extension, &sniff, &blocked);

        if !reason.is_ok() {
            warn!(
                claimed_name = %claimed_name,
                claimed_ext = %candidate.claimed_extension,
                sniffed_ext = %sniff.sniffed_extension,
                mime = %sniff.mime_or_unknown(),
                reason = %reason,
                "Upload rejected"
            );
            return self.reject(tracker, &candidate, reason).await;
        }

        tracker.advance(UploadState::Encrypting);
        let artifact = match self.cipher.encrypt(&data) {
            Ok(artifact) => artifact,
            Err(e) => {
                return self
                    .fail(tracker, &candidate, "encrypt", IoFailureKind::Other, &e)
                    .await;
            }
        };
        drop(data);

        let stored = match self.store.write(&artifact, &candidate.claimed_extension).await {
            Ok(stored) => stored,
            Err(e) => return self.fail(tracker, &candidate, "store", e.kind, &e).await,
        };

        let mut warnings = Vec::new();
        if let Err(e) = self.eraser.secure_delete(candidate.path()).await {
            warn!(
                path = %candidate.path().display(),
                failure_kind = %e.kind(),
                error = %e,
                "Artifact stored but plaintext original was not erased"
            );
            warnings.push(PipelineWarning::OriginalNotErased {
                failure_kind: e.kind(),
            });
        }

        info!(
            claimed_name = %claimed_name,
            claimed_ext = %candidate.claimed_extension,
            mime = %sniff.mime_or_unknown(),
            size_bytes = stored.plaintext_len,
            path = %stored.path.display(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Upload stored"
        );

        let mut outcome = tracker.finish(VerdictReason::Ok, UploadState::Stored);
        outcome.artifact = Some(stored);
        outcome.warnings = warnings;
        outcome
    }

    /// Erase a rejected upload, then report the rejection.
    ///
    /// If the erase fails the caller gets `io_error` instead, never a
    /// rejection while the bytes may still be recoverable.
    async fn reject(
        &self,
        mut tracker: StateTracker,
        candidate: &UploadCandidate,
        reason: VerdictReason,
    ) -> UploadOutcome {
        tracker.advance(UploadState::Erasing);
        match self.eraser.secure_delete(candidate.path()).await {
            Ok(_) => tracker.finish(reason, UploadState::terminal_for(reason)),
            Err(e) => {
                error!(
                    path = %candidate.path().display(),
                    reason = %reason,
                    failure_kind = %e.kind(),
                    error = %e,
                    "Rejected upload could not be erased"
                );
                let mut outcome = tracker.finish(VerdictReason::IoError, UploadState::Failed);
                outcome.warnings.push(PipelineWarning::CleanupIncomplete {
                    failure_kind: e.kind(),
                });
                outcome
            }
        }
    }

    /// Log a fault, erase the upload best-effort, report `io_error`.
    async fn fail(
        &self,
        mut tracker: StateTracker,
        candidate: &UploadCandidate,
        op: &'static str,
        kind: IoFailureKind,
        err: &(dyn std::fmt::Display + Sync),
    ) -> UploadOutcome {
        error!(
            failed_op = op,
            path = %candidate.path().display(),
            failure_kind = %kind,
            error = %err,
            "Upload failed"
        );

        tracker.advance(UploadState::Erasing);
        let cleanup = self.eraser.secure_delete(candidate.path()).await;
        let mut outcome = tracker.finish(VerdictReason::IoError, UploadState::Failed);
        if let Err(e) = cleanup {
            warn!(failure_kind = %e.kind(), error = %e, "Best-effort erase after failure did not complete");
            outcome.warnings.push(PipelineWarning::CleanupIncomplete {
                failure_kind: e.kind(),
            });
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::{tempdir, TempDir};
    use upgate_core::{BlockedExtensionSet, Error, Result};

    struct BrokenOracle;

    #[async_trait::async_trait]
    impl BlocklistOracle for BrokenOracle {
        async fn list_active_fixed_extensions(&self) -> Result<BTreeSet<String>> {
            Err(Error::Blocklist("connection refused".into()))
        }

        async fn list_custom_extensions(&self) -> Result<BTreeSet<String>> {
            Ok(BTreeSet::new())
        }
    }

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

    fn pipeline(dir: &TempDir, oracle: Arc<dyn BlocklistOracle>) -> UploadPipeline {
        let config = PipelineConfig {
            staging_dir: dir.path().join("staging"),
            storage_root: dir.path().join("artifacts"),
            max_upload_bytes: 1024,
            erase_block_size: 512,
        };
        UploadPipeline::new(&config, EncryptionKey::generate(), oracle)
    }

    fn staged_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("staging"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn test_terminal_states() {
        assert_eq!(UploadState::terminal_for(VerdictReason::Ok), UploadState::Stored);
        assert_eq!(
            UploadState::terminal_for(VerdictReason::SniffFailed),
            UploadState::RejectedMismatch
        );
        assert_eq!(
            UploadState::terminal_for(VerdictReason::TooLarge),
            UploadState::RejectedBlocked
        );
        assert!(UploadState::Failed.is_terminal());
        assert!(!UploadState::Erasing.is_terminal());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&UploadState::RejectedMismatch).unwrap(),
            "\"rejected_mismatch\""
        );
    }

    #[tokio::test]
    async fn test_accepted_upload_is_stored() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, Arc::new(BlockedExtensionSet::empty()));

        let outcome = pipeline.process_upload(PDF, "report.pdf").await;
        assert_eq!(outcome.reason, VerdictReason::Ok);
        assert_eq!(outcome.state, UploadState::Stored);
        assert!(outcome.warnings.is_empty());

        let artifact = outcome.artifact.unwrap();
        let stored = pipeline.store().read(&artifact.path).await.unwrap();
        assert_eq!(pipeline.cipher().decrypt(&stored).unwrap(), PDF);
        assert_eq!(staged_files(&dir), 0);
    }

    #[tokio::test]
    async fn test_too_large_is_rejected_before_staging() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, Arc::new(BlockedExtensionSet::empty()));

        let outcome = pipeline.process_upload(&[0u8; 2048], "big.pdf").await;
        assert_eq!(outcome.reason, VerdictReason::TooLarge);
        assert_eq!(outcome.state, UploadState::RejectedBlocked);
        assert_eq!(outcome.http_status(), 413);
        assert_eq!(staged_files(&dir), 0);
    }

    #[tokio::test]
    async fn test_oversized_candidate_is_erased() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, Arc::new(BlockedExtensionSet::empty()));
        let path = dir.path().join("incoming.bin");
        std::fs::write(&path, vec![1u8; 4096]).unwrap();

        let outcome = pipeline
            .process_candidate(UploadCandidate::new("big.pdf", &path, 4096))
            .await;
        assert_eq!(outcome.reason, VerdictReason::TooLarge);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_blocklist_failure_is_io_error() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, Arc::new(BrokenOracle));

        let outcome = pipeline.process_upload(PDF, "report.pdf").await;
        assert_eq!(outcome.reason, VerdictReason::IoError);
        assert_eq!(outcome.state, UploadState::Failed);
        assert!(outcome.artifact.is_none());
        assert_eq!(staged_files(&dir), 0);
    }

    #[tokio::test]
    async fn test_missing_candidate_is_io_error() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, Arc::new(BlockedExtensionSet::empty()));

        let outcome = pipeline
            .process_candidate(UploadCandidate::new(
                "report.pdf",
                dir.path().join("gone.bin"),
                10,
            ))
            .await;
        assert_eq!(outcome.reason, VerdictReason::IoError);
        assert_eq!(outcome.state, UploadState::Failed);
        // Nothing to erase is not a cleanup failure
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_outcome_json_omits_empty_fields() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, Arc::new(BlockedExtensionSet::empty()));

        let outcome = pipeline.process_upload(b"plain words", "notes.txt").await;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["reason"], "sniff_failed");
        assert_eq!(json["state"], "rejected_mismatch");
        assert!(json.get("artifact").is_none());
        assert!(json.get("warnings").is_none());
    }
}
