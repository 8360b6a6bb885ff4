//! Request key generation for cache entries.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request.
///
/// Entries are keyed by method and canonical URL. The method is hashed in
/// even though only GET entries are written today.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
