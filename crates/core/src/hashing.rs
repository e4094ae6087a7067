//! Shared SHA-256 hex digest utility.
//!
//! Access and refresh credentials are only ever persisted as digests produced
//! here, so a database leak does not hand out usable tokens.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}
