//! # upgate-core
//!
//! Core types and policy for the upgate upload gate.
//!
//! This crate provides the data model, the content sniffer, the extension
//! matcher and the blocklist abstractions that the pipeline crate composes.
//! It performs no encryption and no file erasure.

pub mod blocklist;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod sniff;

// Re-export commonly used types at crate root
pub use blocklist::{
    normalize_extension, BlockedExtensionSet, BlocklistDocument, BlocklistOracle,
    CustomExtension, FixedExtension, InMemoryBlocklist,
};
pub use error::{Error, IoFailureKind, Result};
pub use matcher::match_extension;
pub use models::{claimed_extension, sanitize_filename, SniffResult, UploadCandidate, VerdictReason};
pub use sniff::{ContentSniffer, InferSniffer, SignatureMatcher};
