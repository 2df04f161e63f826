//! # Shared Crypto - Overlay Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Data-store request signing |
//! | `hashing` | SHA-256 | Storage keys, filter digests, challenges |
//! | `symmetric` | XChaCha20-Poly1305 | Payload encryption |
//! | `hybrid` | X25519 + HKDF-SHA256 + XChaCha20 | Confidential / mailbox messages |
//! | `pow` | SHA-256 leading zero bits | Anti-spam authorization tokens |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency
//! - **XChaCha20**: 192-bit random nonce per message
//! - **Hybrid sealing**: fresh ephemeral key per message, sender-signed

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod hybrid;
pub mod pow;
pub mod signatures;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{hash20, sha256, sha256_many, Digest20, Hash256};
pub use hybrid::{open, seal, ConfidentialData};
pub use pow::{count_leading_zero_bits, required_zero_bits, ProofOfWork};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use symmetric::{decrypt, encrypt, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
