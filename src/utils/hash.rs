use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `bytes`.
pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// First 8 hex characters of the SHA-256 of `input`. Used to disambiguate
/// colliding project slugs and to key per-destination lock directories.
pub(crate) fn short_hash(input: &str) -> String {
    sha256_hex(input.as_bytes())[..8].to_string()
}
