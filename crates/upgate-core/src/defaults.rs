//! Centralized default constants for upgate.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates and the CLI reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// SNIFFING
// =============================================================================

/// Number of leading bytes handed to the content sniffer.
///
/// Large enough for container formats whose discriminating marker sits past
/// the first kilobyte (tar at 257, OOXML members inside a zip header).
pub const SNIFF_PREFIX_LEN: usize = 8192;

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum accepted upload size in bytes (20 MiB).
pub const MAX_UPLOAD_SIZE_BYTES: u64 = 20 * 1024 * 1024;

/// Default directory where received bytes are staged before validation.
pub const STAGING_DIR: &str = "/var/lib/upgate/staging";

/// Default directory where encrypted artifacts are stored.
pub const STORAGE_ROOT: &str = "/var/lib/upgate/artifacts";

/// Number of random bytes in generated staging and artifact names.
/// Hex-encoded, so names are twice this length.
pub const TOKEN_BYTES: usize = 16;

// =============================================================================
// SECURE ERASURE
// =============================================================================

/// Block size used when overwriting files before unlink (4 KiB).
pub const ERASE_BLOCK_SIZE: usize = 4096;

/// Smallest accepted erase block size.
pub const ERASE_BLOCK_SIZE_MIN: usize = 512;

/// Largest accepted erase block size (1 MiB).
pub const ERASE_BLOCK_SIZE_MAX: usize = 1024 * 1024;

// =============================================================================
// BLOCKLIST
// =============================================================================

/// Maximum length of an extension, excluding the leading dot.
pub const MAX_EXTENSION_LEN: usize = 20;

/// Maximum number of custom extensions an administrator may register.
pub const MAX_CUSTOM_EXTENSIONS: usize = 200;

/// Curated fixed extensions. All start inactive.
pub const FIXED_EXTENSIONS: &[&str] = &[".bat", ".cmd", ".com", ".cpl", ".exe", ".scr", ".js"];

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

/// Hex or base64 encoded 32-byte encryption key.
pub const ENV_ENCRYPTION_KEY: &str = "UPGATE_ENCRYPTION_KEY";

/// Path to a keyfile (raw 32 bytes, hex, or base64).
pub const ENV_KEY_FILE: &str = "UPGATE_KEY_FILE";

/// Staging directory override.
pub const ENV_STAGING_DIR: &str = "UPGATE_STAGING_DIR";

/// Artifact storage root override.
pub const ENV_STORAGE_ROOT: &str = "UPGATE_STORAGE_ROOT";

/// Upload size limit override (bytes).
pub const ENV_MAX_UPLOAD_BYTES: &str = "UPGATE_MAX_UPLOAD_BYTES";

/// Erase block size override (bytes).
pub const ENV_ERASE_BLOCK_SIZE: &str = "UPGATE_ERASE_BLOCK_SIZE";
