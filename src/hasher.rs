//! Content fingerprinting for deduplication
//!
//! Fingerprints are SHA-256 hashes computed over a content-kind domain
//! prefix followed by the payload bytes. The prefix keeps byte-identical
//! text and image content from ever deduplicating against each other.
//!
//! Fingerprinting is deterministic, side-effect free, and total: empty
//! input hashes to the well-defined fingerprint of the bare prefix
//! rather than erroring.

use crate::types::{ClipContent, ContentKind};
use sha2::{Digest, Sha256};

/// Hash arbitrary data using SHA-256
///
/// Returns the hash as a 64-character hexadecimal string. Also used by
/// the snapshot codec for container checksums.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the deduplication fingerprint for clip content
///
/// The hash input is `"<kind>:"` followed by the payload bytes, so the
/// same bytes observed as text and as an image yield distinct
/// fingerprints. Empty payloads fingerprint the prefix alone, which is a
/// fixed per-kind sentinel value.
///
/// # Example
///
/// ```rust
/// use clipvault::hasher::fingerprint;
/// use clipvault::types::ContentKind;
///
/// let a = fingerprint(ContentKind::Text, b"hello");
/// let b = fingerprint(ContentKind::Text, b"hello");
/// let c = fingerprint(ContentKind::Image, b"hello");
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
pub fn fingerprint(kind: ContentKind, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Fingerprint submitted clipboard content
pub fn fingerprint_content(content: &ClipContent) -> String {
    fingerprint(content.kind(), content.fingerprint_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(ContentKind::Text, b"Hello, World!");
        let b = fingerprint(ContentKind::Text, b"Hello, World!");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // SHA-256 hex
    }

    #[test]
    fn test_fingerprint_distinguishes_kind() {
        let text = fingerprint(ContentKind::Text, b"x");
        let image = fingerprint(ContentKind::Image, b"x");
        assert_ne!(text, image);
    }

    #[test]
    fn test_empty_payload_sentinel() {
        // Empty input must hash to a stable per-kind value, not error
        let empty_text = fingerprint(ContentKind::Text, b"");
        let empty_image = fingerprint(ContentKind::Image, b"");
        assert_eq!(empty_text, fingerprint(ContentKind::Text, b""));
        assert_ne!(empty_text, empty_image);
    }

    #[test]
    fn test_fingerprint_content_matches_raw() {
        let content = ClipContent::text("abc");
        assert_eq!(
            fingerprint_content(&content),
            fingerprint(ContentKind::Text, b"abc")
        );
    }
}
