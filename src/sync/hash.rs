//! Content hashing for attachments.
//!
//! Attachments are content-addressed: the upload name of a file is the
//! SHA256 of its bytes followed by the original extension. Identical bytes
//! always produce the same name, whichever direction they travel.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute the SHA256 hex digest of a byte slice.
#[must_use]
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Extension of a file name including the leading dot, or `""`.
///
/// Parse prefixes uploaded names with a random token (`a1b2..._cover.png`),
/// only the part after the last dot matters here.
#[must_use]
pub fn extension_of(name: &str) -> &str {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or("", |ext| &name[name.len() - ext.len() - 1..])
}

/// Content-addressed upload name: `<sha256><ext>`.
#[must_use]
pub fn upload_name(original_name: &str, data: &[u8]) -> String {
    format!("{}{}", content_hash(data), extension_of(original_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        let hash1 = content_hash(b"cover bytes");
        let hash2 = content_hash(b"cover bytes");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        assert_ne!(content_hash(b"one"), content_hash(b"two"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("cover.png"), ".png");
        assert_eq!(extension_of("tfss-123-archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_upload_name_keeps_extension() {
        let name = upload_name("photo.JPG", b"abc");
        assert!(name.ends_with(".JPG"));
        assert_eq!(name.len(), 64 + 4);
    }

    #[test]
    fn test_upload_name_ignores_original_name() {
        // Same bytes under different names still dedupe to the same hash
        let a = upload_name("first.png", b"same");
        let b = upload_name("second.png", b"same");
        assert_eq!(a, b);
    }
}
