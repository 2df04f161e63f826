//! # SHA-256 Hashing
//!
//! Full 32-byte digests for challenges and proofs of work, and the
//! 20-byte digest used for storage keys and inventory filter entries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 output.
pub type Hash256 = [u8; 32];

/// Truncated 20-byte digest.
///
/// Ordered by raw bytes, which is the order inventory filters are sorted in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Digest20([u8; 20]);

impl Digest20 {
    /// Length in bytes.
    pub const LEN: usize = 20;

    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Digest20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest20({})", self.to_hex())
    }
}

impl fmt::Display for Digest20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines.
        write!(f, "{}", &self.to_hex()[..12])
    }
}

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> Hash256 {
    Sha256::digest(data).into()
}

/// SHA-256 over concatenated inputs.
pub fn sha256_many(inputs: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}

/// First 20 bytes of SHA-256 over concatenated inputs.
pub fn hash20(inputs: &[&[u8]]) -> Digest20 {
    let full = sha256_many(inputs);
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    Digest20(out)
}
