use crate::error::HashError;
use sha1::{Digest, Sha1};

pub fn digest(bytes: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// SHA-1 of `bytes`, first eight digest bytes read little-endian.
///
/// Digest byte 0 is the least significant byte of the result. This is the opposite
/// of truncating the digest as a big-endian number.
///
/// The digest is compiled in, so [`HashError::AlgorithmUnavailable`] is never
/// produced here; the error type is part of the signature for parity with
/// runtimes that look the algorithm up by name.
pub fn hash(bytes: &[u8]) -> Result<i64, HashError> {
    let sha = digest(bytes);
    let mut low = [0u8; 8];
    low.copy_from_slice(&sha[..8]);
    Ok(i64::from_le_bytes(low))
}
