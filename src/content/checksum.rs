//! Content hashing using SHA-256
//!
//! Processed objects are named after the hash of their compressed bytes,
//! so identical content always lands on the same object path.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 checksum for the given content
///
/// Returns a lowercase hex string (64 characters).
///
/// # Example
///
/// ```
/// use upload_spooler::content::checksum::compute_sha256;
///
/// let hash = compute_sha256(b"Hello, World!");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn compute_sha256(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Build the object path for a content hash
///
/// The first two hex digits form a fan-out directory:
/// `<remote_dir>/<hh>/<rest><suffix>`.
pub fn object_path(remote_dir: &str, content_hash: &str, suffix: &str) -> String {
    let (fanout, rest) = content_hash.split_at(content_hash.len().min(2));
    let dir = remote_dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("{}/{}{}", fanout, rest, suffix)
    } else {
        format!("{}/{}/{}{}", dir, fanout, rest, suffix)
    }
}
