//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Key derivation failed
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Sealed payload addressed to a different key
    #[error("Sealed payload is not addressed to this key")]
    WrongRecipient,

    /// Proof-of-work search exhausted its attempt budget
    #[error("Proof of work not found within {attempts} attempts")]
    PowExhausted {
        /// Attempts made before giving up
        attempts: u64,
    },
}
