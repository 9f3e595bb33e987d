//! Data model shared across the upload pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A received upload whose raw bytes sit on disk awaiting validation.
///
/// Transient: the file at `storage_path` is consumed either by encryption
/// (followed by erasure of the plaintext) or by the secure eraser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    /// File name as supplied by the client. Attacker-controlled.
    pub claimed_name: String,
    /// Dot-prefixed, lower-cased extension of `claimed_name`, or empty.
    pub claimed_extension: String,
    /// Absolute path of the raw bytes.
    pub storage_path: PathBuf,
    /// Size of the raw bytes.
    pub size_bytes: u64,
}

impl UploadCandidate {
    pub fn new(
        claimed_name: impl Into<String>,
        storage_path: impl Into<PathBuf>,
        size_bytes: u64,
    ) -> Self {
        let claimed_name = claimed_name.into();
        let claimed_extension = claimed_extension(&claimed_name);
        Self {
            claimed_name,
            claimed_extension,
            storage_path: storage_path.into(),
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }
}

/// Outcome of content sniffing. Derived purely from buffer content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniffResult {
    /// Detected MIME type, or `None` when no signature matched.
    pub mime_type: Option<String>,
    /// Canonical extension without the dot (e.g. `"pdf"`), or empty.
    pub sniffed_extension: String,
}

impl SniffResult {
    pub fn known(mime_type: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            sniffed_extension: extension.into(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            mime_type: None,
            sniffed_extension: String::new(),
        }
    }

    /// True when no signature matched.
    pub fn is_unknown(&self) -> bool {
        self.mime_type.is_none() || self.sniffed_extension.is_empty()
    }

    /// MIME type for logging, `"unknown"` when nothing matched.
    pub fn mime_or_unknown(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("unknown")
    }

    /// Sniffed extension with a leading dot, lower-cased. Empty when unknown.
    pub fn dotted_extension(&self) -> String {
        if self.is_unknown() {
            return String::new();
        }
        format!(".{}", self.sniffed_extension.to_lowercase())
    }
}

/// Reason code returned for every upload.
///
/// Computed once per upload, handed to the caller, never stored. The web
/// layer maps it to a status code with [`VerdictReason::http_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    Ok,
    ExtensionMimeMismatch,
    BlockedExtension,
    SniffFailed,
    TooLarge,
    IoError,
}

impl VerdictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictReason::Ok => "ok",
            VerdictReason::ExtensionMimeMismatch => "extension_mime_mismatch",
            VerdictReason::BlockedExtension => "blocked_extension",
            VerdictReason::SniffFailed => "sniff_failed",
            VerdictReason::TooLarge => "too_large",
            VerdictReason::IoError => "io_error",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, VerdictReason::Ok)
    }

    /// Expected policy outcome rather than a fault.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, VerdictReason::Ok | VerdictReason::IoError)
    }

    /// HTTP status the web layer responds with.
    pub fn http_status(&self) -> u16 {
        match self {
            VerdictReason::Ok => 200,
            VerdictReason::ExtensionMimeMismatch
            | VerdictReason::BlockedExtension
            | VerdictReason::SniffFailed => 400,
            VerdictReason::TooLarge => 413,
            VerdictReason::IoError => 500,
        }
    }

    /// Human-readable reason string safe to show to the uploader.
    pub fn message(&self) -> &'static str {
        match self {
            VerdictReason::Ok => "File uploaded successfully.",
            VerdictReason::ExtensionMimeMismatch => {
                "File extension does not match the file's actual content type."
            }
            VerdictReason::BlockedExtension => "Files of this type are blocked and cannot be uploaded.",
            VerdictReason::SniffFailed => "The file's content type could not be recognized.",
            VerdictReason::TooLarge => "File exceeds the maximum upload size.",
            VerdictReason::IoError => "The upload could not be processed.",
        }
    }
}

impl std::fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the claimed extension from a client-supplied file name.
///
/// Path components are ignored. A leading dot (`.bashrc`) is a hidden-file
/// marker, not an extension. The result is dot-prefixed and lower-cased, or
/// empty when the name has no extension.
pub fn claimed_extension(claimed_name: &str) -> String {
    let base = claimed_name.rsplit(['/', '\\']).next().unwrap_or(claimed_name);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => base[idx..].to_lowercase(),
    }
}

/// Sanitize a client-supplied file name for logging.
pub fn sanitize_filename(filename: &str) -> String {
    // Remove path components
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "unnamed_file".to_string();
    }

    // Truncate if too long (preserve extension)
    if sanitized.chars().count() > 255 {
        let chars: Vec<char> = sanitized.chars().collect();
        if let Some(dot_pos) = chars.iter().rposition(|c| *c == '.') {
            let ext: String = chars[dot_pos..].iter().collect();
            let keep = 255usize.saturating_sub(ext.chars().count());
            let name: String = chars[..keep.min(dot_pos)].iter().collect();
            return format!("{}{}", name, ext);
        }
        return chars[..255].iter().collect();
    }

    sanitized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claimed_extension_simple() {
        assert_eq!(claimed_extension("report.pdf"), ".pdf");
        assert_eq!(claimed_extension("IMAGE.PNG"), ".png");
    }

    #[test]
    fn test_claimed_extension_takes_last_segment() {
        assert_eq!(claimed_extension("archive.tar.gz"), ".gz");
        assert_eq!(claimed_extension("invoice.pdf.exe"), ".exe");
    }

    #[test]
    fn test_claimed_extension_ignores_directories() {
        assert_eq!(claimed_extension("../../etc.d/passwd"), "");
        assert_eq!(claimed_extension("C:\\Users\\x\\photo.JPG"), ".jpg");
    }

    #[test]
    fn test_claimed_extension_hidden_file_has_none() {
        assert_eq!(claimed_extension(".bashrc"), "");
        assert_eq!(claimed_extension("noext"), "");
    }

    #[test]
    fn test_candidate_derives_extension() {
        let candidate = UploadCandidate::new("Script.EXE", "/tmp/abc", 10);
        assert_eq!(candidate.claimed_extension, ".exe");
        assert_eq!(candidate.size_bytes, 10);
        assert_eq!(candidate.path(), Path::new("/tmp/abc"));
    }

    #[test]
    fn test_sniff_result_unknown() {
        let unknown = SniffResult::unknown();
        assert!(unknown.is_unknown());
        assert_eq!(unknown.mime_or_unknown(), "unknown");
        assert_eq!(unknown.dotted_extension(), "");
    }

    #[test]
    fn test_sniff_result_dotted_extension_lowercases() {
        let result = SniffResult::known("application/pdf", "PDF");
        assert_eq!(result.dotted_extension(), ".pdf");
    }

    #[test]
    fn test_verdict_status_mapping() {
        assert_eq!(VerdictReason::Ok.http_status(), 200);
        assert_eq!(VerdictReason::ExtensionMimeMismatch.http_status(), 400);
        assert_eq!(VerdictReason::BlockedExtension.http_status(), 400);
        assert_eq!(VerdictReason::SniffFailed.http_status(), 400);
        assert_eq!(VerdictReason::TooLarge.http_status(), 413);
        assert_eq!(VerdictReason::IoError.http_status(), 500);
    }

    #[test]
    fn test_verdict_serializes_snake_case() {
        let json = serde_json::to_string(&VerdictReason::ExtensionMimeMismatch).unwrap();
        assert_eq!(json, "\"extension_mime_mismatch\"");
        assert_eq!(VerdictReason::BlockedExtension.to_string(), "blocked_extension");
    }

    #[test]
    fn test_verdict_rejection_classification() {
        assert!(!VerdictReason::Ok.is_rejection());
        assert!(!VerdictReason::IoError.is_rejection());
        assert!(VerdictReason::SniffFailed.is_rejection());
        assert!(VerdictReason::TooLarge.is_rejection());
    }

    #[test]
    fn test_sanitize_removes_path() {
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Windows\\system32.dll"), "system32.dll");
    }

    #[test]
    fn test_sanitize_removes_dangerous_chars() {
        assert_eq!(sanitize_filename("file<>:test.txt"), "file___test.txt");
        assert_eq!(sanitize_filename("bad\nname.pdf"), "bad_name.pdf");
    }

    #[test]
    fn test_sanitize_truncates_long_names() {
        let long_name = format!("{}.txt", "a".repeat(300));
        let sanitized = sanitize_filename(&long_name);
        assert_eq!(sanitized.chars().count(), 255);
        assert!(sanitized.ends_with(".txt"));
    }

    #[test]
    fn test_sanitize_handles_empty() {
        assert_eq!(sanitize_filename(""), "unnamed_file");
        assert_eq!(sanitize_filename("   "), "unnamed_file");
    }
}
