//! Content fingerprints for cache-busted variant filenames.
//!
//! A fingerprint is the first eight hex characters of the SHA-256 digest of
//! the source bytes. That is plenty to cache-bust a filename — this is not a
//! security boundary, it only has to make `a-640w-<hash>.webp` change when
//! the source image changes. The token is fully deterministic: no salt, no
//! timestamps, so repeated builds over unchanged inputs produce identical
//! output paths.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
const TOKEN_LEN: usize = 8;

/// Short deterministic content token for embedding in filenames.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex = format!("{:x}", digest);
    hex[..TOKEN_LEN].to_string()
}
