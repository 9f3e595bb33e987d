//! Error types for upgate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using upgate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for upgate operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Blocklist lookup failed
    #[error("Blocklist error: {0}")]
    Blocklist(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Classification of filesystem failures.
///
/// Every filesystem error surfaced by the pipeline is reduced to one of these
/// kinds so callers can match on it exhaustively instead of inspecting raw
/// OS error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoFailureKind {
    /// The path does not exist.
    NotFound,
    /// The process lacks permission for the path or its directory.
    PermissionDenied,
    /// The device or quota is exhausted.
    StorageFull,
    /// Anything else.
    Other,
}

impl IoFailureKind {
    /// Classify an I/O error.
    pub fn classify(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoFailureKind::NotFound,
            std::io::ErrorKind::PermissionDenied => IoFailureKind::PermissionDenied,
            _ if is_storage_full(err) => IoFailureKind::StorageFull,
            _ => IoFailureKind::Other,
        }
    }

    /// Stable snake_case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            IoFailureKind::NotFound => "not_found",
            IoFailureKind::PermissionDenied => "permission_denied",
            IoFailureKind::StorageFull => "storage_full",
            IoFailureKind::Other => "other",
        }
    }
}

impl std::fmt::Display for IoFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(unix)]
fn is_storage_full(err: &std::io::Error) -> bool {
    // ENOSPC and EDQUOT (Linux numbering; macOS EDQUOT is 69)
    matches!(err.raw_os_error(), Some(28) | Some(122) | Some(69))
}

#[cfg(not(unix))]
fn is_storage_full(err: &std::io::Error) -> bool {
    // ERROR_HANDLE_DISK_FULL, ERROR_DISK_FULL
    matches!(err.raw_os_error(), Some(39) | Some(112))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound(".exe".to_string());
        assert_eq!(err.to_string(), "Not found: .exe");
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict(".zzz already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: .zzz already exists");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing encryption key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing encryption key");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_classify_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(IoFailureKind::classify(&err), IoFailureKind::NotFound);
    }

    #[test]
    fn test_classify_permission_denied() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "EACCES");
        assert_eq!(IoFailureKind::classify(&err), IoFailureKind::PermissionDenied);
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_storage_full() {
        let err = std::io::Error::from_raw_os_error(28);
        assert_eq!(IoFailureKind::classify(&err), IoFailureKind::StorageFull);
    }

    #[test]
    fn test_classify_other() {
        let err = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad");
        assert_eq!(IoFailureKind::classify(&err), IoFailureKind::Other);
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(IoFailureKind::PermissionDenied.to_string(), "permission_denied");
        assert_eq!(IoFailureKind::StorageFull.as_str(), "storage_full");
    }
}
