//! Digest helpers. Kept apart from the cipher so nothing here is ever
//! mistaken for an authentication primitive: these values identify data,
//! they do not protect it.

use sha2::{Digest, Sha256};

/// Number of hex characters kept when shortening a digest to a fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Produces a raw SHA-256 digest of the provided bytes.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Returns the hexadecimal representation of a SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = sha256_digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Short, log-safe identifier for secret material. Two runs that print the
/// same fingerprint used the same key.
pub fn fingerprint(data: &[u8]) -> String {
    let mut hex = sha256_hex(data);
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
