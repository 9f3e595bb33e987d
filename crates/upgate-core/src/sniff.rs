//! Content sniffing from magic bytes.
//!
//! The sniffer looks only at a bounded prefix of the buffer and never at the
//! claimed file name. Unrecognized content is a normal outcome
//! ([`SniffResult::unknown`]), not an error.

use crate::defaults::SNIFF_PREFIX_LEN;
use crate::models::SniffResult;

/// Infers the true content type of a buffer.
pub trait ContentSniffer: Send + Sync {
    /// Inspect the leading bytes of `data`.
    fn sniff(&self, data: &[u8]) -> SniffResult;
}

/// Signature matcher for a custom format. Receives the bounded prefix.
pub type SignatureMatcher = fn(&[u8]) -> bool;

/// Magic-byte sniffer backed by the `infer` signature table.
///
/// Built-in signatures are consulted before custom ones, so a custom matcher
/// can never shadow a well-known format.
pub struct InferSniffer {
    inner: infer::Infer,
    prefix_len: usize,
}

impl InferSniffer {
    pub fn new() -> Self {
        Self {
            inner: infer::Infer::new(),
            prefix_len: SNIFF_PREFIX_LEN,
        }
    }

    /// Register an additional signature.
    ///
    /// `extension` is given without a leading dot, e.g. `"zzz"`.
    pub fn with_matcher(
        mut self,
        mime_type: &'static str,
        extension: &'static str,
        matcher: SignatureMatcher,
    ) -> Self {
        self.inner.add(mime_type, extension, matcher);
        self
    }

    /// Override how many leading bytes are inspected.
    pub fn with_prefix_len(mut self, prefix_len: usize) -> Self {
        self.prefix_len = prefix_len.max(1);
        self
    }
}

impl Default for InferSniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSniffer for InferSniffer {
    fn sniff(&self, data: &[u8]) -> SniffResult {
        let prefix = &data[..data.len().min(self.prefix_len)];
        match self.inner.get(prefix) {
            Some(kind) => SniffResult::known(kind.mime_type(), kind.extension()),
            None => SniffResult::unknown(),
        }
    }
}
