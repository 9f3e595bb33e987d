//! Structured logging schema and field name constants for upgate.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation tools can query every subsystem the same way.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | I/O failure, upload could not be stored or erased |
//! | WARN  | Policy rejection, degraded cleanup |
//! | INFO  | Lifecycle events, upload completions |
//! | DEBUG | Pipeline state transitions, config choices |
//! | TRACE | Per-block erase progress |
//!
//! Key material is never logged, not even at TRACE.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID for one upload. Format: UUIDv7 (time-ordered).
pub const UPLOAD_ID: &str = "upload_id";

/// Subsystem originating the log event.
/// Values: "pipeline", "sniff", "blocklist", "crypto", "storage", "erase", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "process", "transition", "secure_delete", "write_artifact"
pub const OPERATION: &str = "op";

// ─── Upload fields ─────────────────────────────────────────────────────────

/// Sanitized claimed file name.
pub const CLAIMED_NAME: &str = "claimed_name";

/// Claimed extension (dot-prefixed, lower case).
pub const CLAIMED_EXT: &str = "claimed_ext";

/// Extension produced by the sniffer.
pub const SNIFFED_EXT: &str = "sniffed_ext";

/// MIME type produced by the sniffer.
pub const MIME: &str = "mime";

/// Verdict reason code.
pub const REASON: &str = "reason";

/// Pipeline state name.
pub const STATE: &str = "state";

/// Filesystem path being operated on.
pub const PATH: &str = "path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Size in bytes of the upload or file.
pub const SIZE_BYTES: &str = "size_bytes";

/// Number of blocks overwritten.
pub const BLOCKS: &str = "blocks";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Classified I/O failure kind.
pub const FAILURE_KIND: &str = "failure_kind";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
