//! Blocked extension model and the oracle the pipeline reads it through.
//!
//! The blocklist has two partitions:
//! - **fixed**: an administrator-curated catalogue, each entry toggled
//!   active or inactive
//! - **custom**: user-submitted extensions, always active
//!
//! Only active entries take part in matching. An extension never appears in
//! both partitions; [`InMemoryBlocklist::add_custom`] enforces this at
//! insertion time and matching does not re-check it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::defaults::{FIXED_EXTENSIONS, MAX_CUSTOM_EXTENSIONS, MAX_EXTENSION_LEN};
use crate::error::{Error, Result};

/// Point-in-time view of the active blocked extensions.
///
/// Read once per upload. All entries are dot-prefixed and lower case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedExtensionSet {
    fixed: BTreeSet<String>,
    custom: BTreeSet<String>,
}

impl BlockedExtensionSet {
    /// Build a snapshot from the active fixed and the custom partitions.
    ///
    /// Entries are lower-cased; callers supply dot-prefixed strings.
    pub fn from_parts<F, C>(fixed_active: F, custom: C) -> Self
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            fixed: fixed_active
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .collect(),
            custom: custom
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether a dot-prefixed extension is blocked. Case-insensitive.
    pub fn contains(&self, dotted_extension: &str) -> bool {
        let ext = dotted_extension.to_lowercase();
        self.fixed.contains(&ext) || self.custom.contains(&ext)
    }

    pub fn fixed_active(&self) -> &BTreeSet<String> {
        &self.fixed
    }

    pub fn custom(&self) -> &BTreeSet<String> {
        &self.custom
    }

    pub fn len(&self) -> usize {
        self.fixed.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.custom.is_empty()
    }
}

/// Read-only source of the current blocklist.
///
/// Implementations sit in front of whatever store holds the lists. The
/// pipeline takes one [`snapshot`](BlocklistOracle::snapshot) per upload.
#[async_trait]
pub trait BlocklistOracle: Send + Sync {
    /// Fixed extensions currently toggled active.
    async fn list_active_fixed_extensions(&self) -> Result<BTreeSet<String>>;

    /// All custom extensions.
    async fn list_custom_extensions(&self) -> Result<BTreeSet<String>>;

    /// Combined snapshot used for one match.
    async fn snapshot(&self) -> Result<BlockedExtensionSet> {
        let fixed = self.list_active_fixed_extensions().await?;
        let custom = self.list_custom_extensions().await?;
        Ok(BlockedExtensionSet::from_parts(fixed, custom))
    }
}

/// A fixed snapshot is itself an oracle, which keeps tests deterministic.
#[async_trait]
impl BlocklistOracle for BlockedExtensionSet {
    async fn list_active_fixed_extensions(&self) -> Result<BTreeSet<String>> {
        Ok(self.fixed.clone())
    }

    async fn list_custom_extensions(&self) -> Result<BTreeSet<String>> {
        Ok(self.custom.clone())
    }

    async fn snapshot(&self) -> Result<BlockedExtensionSet> {
        Ok(self.clone())
    }
}

/// Entry in the fixed catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedExtension {
    pub extension: String,
    #[serde(default)]
    pub active: bool,
}

/// User-submitted extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomExtension {
    pub extension: String,
    pub created_at: DateTime<Utc>,
}

/// Serialized form of an [`InMemoryBlocklist`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistDocument {
    #[serde(default)]
    pub fixed: Vec<FixedExtension>,
    #[serde(default)]
    pub custom: Vec<CustomExtension>,
}

/// Validate and normalize an administrator-supplied extension.
///
/// Accepts `.ext` where `ext` is 1..=[`MAX_EXTENSION_LEN`] characters with no
/// dots, path separators, whitespace or control characters. Returns the
/// lower-cased form.
pub fn normalize_extension(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let Some(body) = trimmed.strip_prefix('.') else {
        return Err(Error::InvalidInput(format!(
            "extension must start with '.': {:?}",
            trimmed
        )));
    };
    if body.is_empty() {
        return Err(Error::InvalidInput("extension must not be empty".to_string()));
    }
    if body.chars().count() > MAX_EXTENSION_LEN {
        return Err(Error::InvalidInput(format!(
            "extension longer than {} characters",
            MAX_EXTENSION_LEN
        )));
    }
    if body
        .chars()
        .any(|c| matches!(c, '.' | '/' | '\\') || c.is_whitespace() || c.is_control())
    {
        return Err(Error::InvalidInput(format!(
            "extension contains invalid characters: {:?}",
            trimmed
        )));
    }
    Ok(format!(".{}", body.to_lowercase()))
}

#[derive(Debug, Default)]
struct BlocklistState {
    fixed: BTreeMap<String, bool>,
    custom: Vec<CustomExtension>,
}

impl BlocklistState {
    fn contains(&self, ext: &str) -> bool {
        self.fixed.contains_key(ext) || self.custom.iter().any(|c| c.extension == ext)
    }

    fn insert_custom(&mut self, ext: String, created_at: DateTime<Utc>) -> Result<()> {
        if self.contains(&ext) {
            return Err(Error::Conflict(format!("extension {} already exists", ext)));
        }
        if self.custom.len() >= MAX_CUSTOM_EXTENSIONS {
            return Err(Error::InvalidInput(format!(
                "at most {} custom extensions are allowed",
                MAX_CUSTOM_EXTENSIONS
            )));
        }
        self.custom.push(CustomExtension {
            extension: ext,
            created_at,
        });
        Ok(())
    }
}

/// Blocklist held in process memory.
///
/// Stands in for the relational store of a deployed service and implements
/// the administrative operations on top of [`BlocklistOracle`].
#[derive(Debug)]
pub struct InMemoryBlocklist {
    state: RwLock<BlocklistState>,
}

impl InMemoryBlocklist {
    /// Blocklist seeded with the default fixed catalogue, all inactive.
    pub fn new() -> Self {
        let fixed = FIXED_EXTENSIONS
            .iter()
            .map(|e| (e.to_string(), false))
            .collect();
        Self {
            state: RwLock::new(BlocklistState {
                fixed,
                custom: Vec::new(),
            }),
        }
    }

    /// Rebuild a blocklist from its serialized form.
    ///
    /// Custom entries go through the same insertion checks as
    /// [`add_custom`](Self::add_custom), so a hand-edited document cannot
    /// break the partition invariant.
    pub fn from_document(doc: BlocklistDocument) -> Result<Self> {
        let mut state = BlocklistState::default();
        for entry in doc.fixed {
            let ext = normalize_extension(&entry.extension)?;
            if state.fixed.insert(ext.clone(), entry.active).is_some() {
                return Err(Error::Conflict(format!("duplicate fixed extension {}", ext)));
            }
        }
        for entry in doc.custom {
            let ext = normalize_extension(&entry.extension)?;
            state.insert_custom(ext, entry.created_at)?;
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Load a blocklist from a JSON file.
    pub async fn load_json(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let doc: BlocklistDocument = serde_json::from_slice(&bytes)?;
        Self::from_document(doc)
    }

    /// Save the blocklist as pretty JSON.
    pub async fn save_json(&self, path: &Path) -> Result<()> {
        let doc = self.to_document().await;
        let json = serde_json::to_vec_pretty(&doc)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn to_document(&self) -> BlocklistDocument {
        let state = self.state.read().await;
        BlocklistDocument {
            fixed: state
                .fixed
                .iter()
                .map(|(extension, active)| FixedExtension {
                    extension: extension.clone(),
                    active: *active,
                })
                .collect(),
            custom: state.custom.clone(),
        }
    }

    /// All fixed entries with their active flag, ordered by extension.
    pub async fn list_fixed(&self) -> Vec<FixedExtension> {
        self.to_document().await.fixed
    }

    /// Toggle a fixed entry.
    pub async fn set_fixed_active(&self, extension: &str, active: bool) -> Result<()> {
        let ext = normalize_extension(extension)?;
        let mut state = self.state.write().await;
        match state.fixed.get_mut(&ext) {
            Some(flag) => {
                *flag = active;
                info!(
                    subsystem = "blocklist",
                    op = "set_fixed_active",
                    extension = %ext,
                    active,
                    "Fixed extension toggled"
                );
                Ok(())
            }
            None => Err(Error::NotFound(format!("fixed extension {}", ext))),
        }
    }

    /// Register a custom extension. Returns the stored entry.
    pub async fn add_custom(&self, extension: &str) -> Result<CustomExtension> {
        let ext = normalize_extension(extension)?;
        let mut state = self.state.write().await;
        state.insert_custom(ext.clone(), Utc::now())?;
        info!(
            subsystem = "blocklist",
            op = "add_custom",
            extension = %ext,
            custom_count = state.custom.len(),
            "Custom extension added"
        );
        state
            .custom
            .last()
            .cloned()
            .ok_or_else(|| Error::Internal("custom extension vanished after insert".to_string()))
    }

    /// Remove a custom extension.
    pub async fn remove_custom(&self, extension: &str) -> Result<()> {
        let ext = normalize_extension(extension)?;
        let mut state = self.state.write().await;
        let before = state.custom.len();
        state.custom.retain(|c| c.extension != ext);
        if state.custom.len() == before {
            return Err(Error::NotFound(format!("custom extension {}", ext)));
        }
        info!(
            subsystem = "blocklist",
            op = "remove_custom",
            extension = %ext,
            "Custom extension removed"
        );
        Ok(())
    }

    /// Custom entries, newest first.
    pub async fn list_custom(&self) -> Vec<CustomExtension> {
        let state = self.state.read().await;
        let mut entries = state.custom.clone();
        entries.reverse();
        entries
    }
}

impl Default for InMemoryBlocklist {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlocklistOracle for InMemoryBlocklist {
    async fn list_active_fixed_extensions(&self) -> Result<BTreeSet<String>> {
        let state = self.state.read().await;
        Ok(state
            .fixed
            .iter()
            .filter(|(_, active)| **active)
            .map(|(ext, _)| ext.clone())
            .collect())
    }

    async fn list_custom_extensions(&self) -> Result<BTreeSet<String>> {
        let state = self.state.read().await;
        Ok(state.custom.iter().map(|c| c.extension.clone()).collect())
    }

    async fn snapshot(&self) -> Result<BlockedExtensionSet> {
        // Single read guard so both partitions come from the same moment.
        let state = self.state.read().await;
        Ok(BlockedExtensionSet::from_parts(
            state.fixed.iter().filter(|(_, a)| **a).map(|(e, _)| e),
            state.custom.iter().map(|c| &c.extension),
        ))
    }
}
