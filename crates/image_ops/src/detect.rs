/// Canonical mime types this workspace recognizes.
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_GIF: &str = "image/gif";
pub const MIME_WEBP: &str = "image/webp";
pub const MIME_HEIC: &str = "image/heic";

/// Detects the image type from magic bytes first, falling back to the
/// claimed filename extension. Returns `None` if neither source yields a
/// recognized image type.
#[must_use]
pub fn detect_image_type(filename: &str, bytes: &[u8]) -> Option<&'static str> {
    if let Some(mime) = detect_from_magic(bytes) {
        return Some(mime);
    }
    detect_from_extension(filename)
}

fn detect_from_magic(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        return Some(MIME_JPEG);
    }
    if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some(MIME_PNG);
    }
    if bytes.len() >= 6 && (&bytes[0..6] == b"GIF87a" || &bytes[0..6] == b"GIF89a") {
        return Some(MIME_GIF);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(MIME_WEBP);
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if matches!(
            brand,
            b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" | b"mif1" | b"msf1"
        ) {
            return Some(MIME_HEIC);
        }
    }
    None
}

fn detect_from_extension(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(MIME_JPEG),
        "png" => Some(MIME_PNG),
        "gif" => Some(MIME_GIF),
        "webp" => Some(MIME_WEBP),
        "heic" | "heif" => Some(MIME_HEIC),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_jpeg_from_magic_bytes() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0];
        assert_eq!(detect_image_type("photo.bin", &bytes), Some(MIME_JPEG));
    }

    #[test]
    fn detects_png_from_magic_bytes() {
        let bytes = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_image_type("photo.bin", &bytes), Some(MIME_PNG));
    }

    #[test]
    fn falls_back_to_extension_when_magic_unrecognized() {
        assert_eq!(detect_image_type("photo.png", &[0, 0, 0]), Some(MIME_PNG));
    }

    #[test]
    fn mismatched_claim_is_detectable_by_caller() {
        // PNG bytes claimed as .jpg: magic wins, caller compares against the claim.
        let bytes = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_image_type("photo.jpg", &bytes), Some(MIME_PNG));
    }

    #[test]
    fn unrecognized_bytes_and_extension_yield_none() {
        assert_eq!(detect_image_type("readme.txt", &[1, 2, 3]), None);
    }
}
