//! Envelope and authorization errors.

use shared_crypto::CryptoError;
use thiserror::Error;

/// Why an authorization token was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthorizationError {
    #[error("Message counter {counter} not above last seen {last}")]
    ReplayedCounter { counter: u32, last: u32 },

    #[error("Proof of work bound to another payload")]
    PayloadMismatch,

    #[error("Proof of work bound to another challenge")]
    ChallengeMismatch,

    #[error("Difficulty {actual} below required {expected}")]
    DifficultyTooLow { expected: f64, actual: f64 },

    #[error("Proof of work does not meet its difficulty")]
    InvalidProof,

    #[error("Token mint failed: {0}")]
    Mint(#[from] CryptoError),

    #[error("Payload encoding failed: {0}")]
    Encode(String),
}

/// Envelope codec and framing errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Unsupported protocol version {version} (accepting {min}..={max})")]
    UnsupportedVersion { version: i32, min: i32, max: i32 },

    #[error("Frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Unauthorized message: {0}")]
    Unauthorized(#[from] AuthorizationError),

    #[error("No decoder registered for extension type {0}")]
    UnknownExtension(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvelopeError {
    /// True when the peer sent something unparsable or out of protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            EnvelopeError::Decode(_)
                | EnvelopeError::UnsupportedVersion { .. }
                | EnvelopeError::FrameTooLarge { .. }
                | EnvelopeError::Unauthorized(_)
        )
    }
}
