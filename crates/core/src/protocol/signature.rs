use sha1::{Digest, Sha1};

/// Webhook signature: SHA-1 over the lexicographically sorted concatenation of
/// the shared secret, timestamp and nonce, as lowercase hex.
pub fn compute_signature(shared_secret: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [shared_secret, timestamp, nonce];
    parts.sort_unstable();
    hex::encode(Sha1::digest(parts.concat().as_bytes()))
}

/// Case-sensitive comparison against the recomputed signature.
pub fn verify_signature(signature: &str, timestamp: &str, nonce: &str, shared_secret: &str) -> bool {
    compute_signature(shared_secret, timestamp, nonce) == signature
}
