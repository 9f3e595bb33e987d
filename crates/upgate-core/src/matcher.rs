//! Claimed-vs-sniffed extension matching and blocklist enforcement.

use crate::blocklist::BlockedExtensionSet;
use crate::models::{SniffResult, VerdictReason};

/// Decide whether an upload may proceed to encryption.
///
/// Checks, in order:
/// 1. unrecognized content is `SniffFailed`
/// 2. the claimed extension must equal `"." + sniffed` after lower-casing
///    (`ExtensionMimeMismatch` otherwise)
/// 3. the sniffed extension must not be in the active blocklist
///    (`BlockedExtension` otherwise)
///
/// The comparison in step 2 is strict string equality. There is no
/// equivalence table, so a JPEG named `.jpeg` (sniffed as `jpg`) mismatches.
pub fn match_extension(
    claimed_extension: &str,
    sniffed: &SniffResult,
    blocked: &BlockedExtensionSet,
) -> VerdictReason {
    if sniffed.is_unknown() {
        return VerdictReason::SniffFailed;
    }

    let sniffed_ext = sniffed.dotted_extension();
    if claimed_extension.to_lowercase() != sniffed_ext {
        return VerdictReason::ExtensionMimeMismatch;
    }

    if blocked.contains(&sniffed_ext) {
        return VerdictReason::BlockedExtension;
    }

    VerdictReason::Ok
}
