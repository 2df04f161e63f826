//! Envelope <-> bytes.
//!
//! Layout is bincode with fixed-width big-endian integers, so the version
//! is always the first four bytes and can be checked before the rest is
//! parsed.

use crate::domain::envelope::{NetworkEnvelope, MAX_FRAME_SIZE, MIN_SUPPORTED_VERSION, PROTOCOL_VERSION};
use crate::domain::errors::{AuthorizationError, EnvelopeError};
use crate::domain::payload::EnvelopePayloadMessage;
use bincode::Options;
use shared_crypto::{sha256, Hash256};

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit(MAX_FRAME_SIZE as u64)
}

pub fn encode(envelope: &NetworkEnvelope) -> Result<Vec<u8>, EnvelopeError> {
    let bytes = wire_options()
        .serialize(envelope)
        .map_err(|e| EnvelopeError::Encode(e.to_string()))?;
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(EnvelopeError::FrameTooLarge {
            len: bytes.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(bytes)
}

/// Parse an envelope. Unknown payload tags, missing fields and trailing
/// bytes are all decode errors.
pub fn decode(bytes: &[u8]) -> Result<NetworkEnvelope, EnvelopeError> {
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(EnvelopeError::FrameTooLarge {
            len: bytes.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let version = peek_version(bytes)?;
    if !NetworkEnvelope::is_supported_version(version) {
        return Err(EnvelopeError::UnsupportedVersion {
            version,
            min: MIN_SUPPORTED_VERSION,
            max: PROTOCOL_VERSION,
        });
    }
    wire_options()
        .deserialize(bytes)
        .map_err(|e| EnvelopeError::Decode(e.to_string()))
}

fn peek_version(bytes: &[u8]) -> Result<i32, EnvelopeError> {
    let prefix: [u8; 4] = bytes
        .get(..4)
        .and_then(|prefix| prefix.try_into().ok())
        .ok_or_else(|| EnvelopeError::Decode(format!("{} bytes is too short", bytes.len())))?;
    Ok(i32::from_be_bytes(prefix))
}

/// Digest the proof of work is bound to.
pub fn payload_digest(payload: &EnvelopePayloadMessage) -> Result<Hash256, AuthorizationError> {
    let bytes = wire_options()
        .serialize(payload)
        .map_err(|e| AuthorizationError::Encode(e.to_string()))?;
    Ok(sha256(&bytes))
}
