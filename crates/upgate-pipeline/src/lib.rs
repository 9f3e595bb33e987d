//! # upgate-pipeline
//!
//! Orchestrates an upload from received bytes to either an encrypted
//! artifact at rest or a securely erased rejection.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use upgate_core::InMemoryBlocklist;
//! use upgate_pipeline::{load_encryption_key, PipelineConfig, UploadPipeline};
//!
//! let config = PipelineConfig::from_env()?;
//! let pipeline = UploadPipeline::new(&config, load_encryption_key()?, Arc::new(InMemoryBlocklist::new()));
//! pipeline.validate_storage().await?;
//!
//! let outcome = pipeline.process_upload(&bytes, "report.pdf").await;
//! println!("{} {}", outcome.http_status(), outcome.message());
//! ```

pub mod config;
pub mod eraser;
pub mod pipeline;
pub mod storage;

pub use config::{load_encryption_key, PipelineConfig};
pub use eraser::{EntropySource, EraseError, EraseOutcome, OsEntropy, OverwriteFailure, SecureEraser};
pub use pipeline::{PipelineWarning, UploadOutcome, UploadPipeline, UploadState};
pub use storage::{ArtifactStore, StagingArea, StorageError, StoredArtifact};
