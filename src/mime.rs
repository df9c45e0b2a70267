//! MIME type helpers shared by the adapters and the CLI.

use std::path::Path;

/// Sniff a MIME type from magic bytes.
pub fn detect_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, ..] => Some("video/mp4"),
        _ => None,
    }
}

pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Resolve the MIME type of a local file: content first, then extension.
pub fn resolve_mime(path: &Path, bytes: &[u8]) -> &'static str {
    detect_mime(bytes)
        .or_else(|| mime_from_extension(path))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Unrecognized file format for {} (first 4 bytes: {:02X?}), falling back to application/octet-stream",
                path.display(),
                &bytes[..bytes.len().min(4)]
            );
            "application/octet-stream"
        })
}

/// File extension used for object keys and reported formats.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "application/pdf" => "pdf",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
}
