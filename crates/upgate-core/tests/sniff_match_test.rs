//! Sniffer and matcher working together on real file signatures.

use upgate_core::{
    claimed_extension, match_extension, BlocklistOracle, ContentSniffer, InMemoryBlocklist,
    InferSniffer, VerdictReason,
};

/// Minimal PE32 console executable header (DOS stub + PE signature + COFF +
/// optional header), enough for signature detection.
fn pe_executable() -> Vec<u8> {
    let mut buf = vec![0u8; 1024];
    buf[0] = b'M';
    buf[1] = b'Z';
    buf[0x3C..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    buf[0x40..0x44].copy_from_slice(b"PE\0\0");
    let coff = 0x44;
    buf[coff..coff + 2].copy_from_slice(&0x014Cu16.to_le_bytes()); // i386
    buf[coff + 2..coff + 4].copy_from_slice(&1u16.to_le_bytes()); // sections
    buf[coff + 16..coff + 18].copy_from_slice(&0x00E0u16.to_le_bytes()); // optional header size
    buf[coff + 18..coff + 20].copy_from_slice(&0x0102u16.to_le_bytes()); // EXECUTABLE_IMAGE | 32BIT
    let opt = coff + 20;
    buf[opt..opt + 2].copy_from_slice(&0x010Bu16.to_le_bytes()); // PE32
    buf[opt + 68..opt + 70].copy_from_slice(&3u16.to_le_bytes()); // console subsystem
    buf
}

fn jpeg() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    data.extend_from_slice(&[0u8; 64]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

fn is_zzz(buf: &[u8]) -> bool {
    buf.starts_with(b"ZZZ\x01")
}

async fn verdict_for(
    name: &str,
    data: &[u8],
    sniffer: &InferSniffer,
    oracle: &dyn BlocklistOracle,
) -> VerdictReason {
    let snapshot = oracle.snapshot().await.unwrap();
    match_extension(&claimed_extension(name), &sniffer.sniff(data), &snapshot)
}

#[tokio::test]
async fn test_real_pdf_with_empty_blocklist_is_ok() {
    let blocklist = InMemoryBlocklist::new();
    let verdict = verdict_for(
        "report.pdf",
        b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n",
        &InferSniffer::new(),
        &blocklist,
    )
    .await;
    assert_eq!(verdict, VerdictReason::Ok);
}

#[tokio::test]
async fn test_jpeg_named_png_mismatches() {
    let blocklist = InMemoryBlocklist::new();
    let verdict = verdict_for("image.png", &jpeg(), &InferSniffer::new(), &blocklist).await;
    assert_eq!(verdict, VerdictReason::ExtensionMimeMismatch);
}

#[tokio::test]
async fn test_active_fixed_exe_is_blocked() {
    let blocklist = InMemoryBlocklist::new();
    blocklist.set_fixed_active(".exe", true).await.unwrap();
    let verdict =
        verdict_for("script.exe", &pe_executable(), &InferSniffer::new(), &blocklist).await;
    assert_eq!(verdict, VerdictReason::BlockedExtension);
}

#[tokio::test]
async fn test_inactive_fixed_exe_is_allowed() {
    let blocklist = InMemoryBlocklist::new();
    let verdict =
        verdict_for("script.exe", &pe_executable(), &InferSniffer::new(), &blocklist).await;
    assert_eq!(verdict, VerdictReason::Ok);
}

#[tokio::test]
async fn test_custom_zzz_is_blocked() {
    let blocklist = InMemoryBlocklist::new();
    blocklist.add_custom(".zzz").await.unwrap();
    let sniffer = InferSniffer::new().with_matcher("application/x-zzz", "zzz", is_zzz);
    let verdict = verdict_for("notes.zzz", b"ZZZ\x01body", &sniffer, &blocklist).await;
    assert_eq!(verdict, VerdictReason::BlockedExtension);
}

#[tokio::test]
async fn test_plain_text_fails_sniffing() {
    let blocklist = InMemoryBlocklist::new();
    let verdict = verdict_for("notes.txt", b"hello world", &InferSniffer::new(), &blocklist).await;
    assert_eq!(verdict, VerdictReason::SniffFailed);
}
