//! The frame every message travels in.

use serde::{Deserialize, Serialize};
use shared_crypto::ProofOfWork;

use super::payload::EnvelopePayloadMessage;

/// Version written by this node.
pub const PROTOCOL_VERSION: i32 = 1;

/// Oldest version still accepted.
pub const MIN_SUPPORTED_VERSION: i32 = 1;

/// Largest encoded envelope accepted from a peer.
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Anti-spam proof attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationToken {
    pub proof_of_work: ProofOfWork,
    /// Per-connection send counter. The handshake uses 0, every later
    /// message a strictly larger value.
    pub message_counter: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEnvelope {
    pub version: i32,
    pub authorization_token: AuthorizationToken,
    pub payload: EnvelopePayloadMessage,
}

impl NetworkEnvelope {
    pub fn new(authorization_token: AuthorizationToken, payload: EnvelopePayloadMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            authorization_token,
            payload,
        }
    }

    pub fn is_supported_version(version: i32) -> bool {
        (MIN_SUPPORTED_VERSION..=PROTOCOL_VERSION).contains(&version)
    }
}
