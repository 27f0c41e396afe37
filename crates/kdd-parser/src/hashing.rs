use sha2::{Digest, Sha256};

/// SHA-256 hex digest of raw bytes. Source files are hashed exactly as
/// read, without any normalization.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn byte_sensitive() {
        assert_ne!(content_hash(b"a\nb"), content_hash(b"a\r\nb"));
    }
}
