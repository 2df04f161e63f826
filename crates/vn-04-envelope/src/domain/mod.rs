//! Envelope domain: payload union, token, network load, errors.

pub mod envelope;
pub mod errors;
pub mod network_load;
pub mod payload;

pub use envelope::{
    AuthorizationToken, NetworkEnvelope, MAX_FRAME_SIZE, MIN_SUPPORTED_VERSION, PROTOCOL_VERSION,
};
pub use errors::{AuthorizationError, EnvelopeError};
pub use network_load::{LoadInputs, NetworkLoad, NetworkLoadSnapshot};
pub use payload::{
    Capability, CloseReason, ConfidentialMessage, EnvelopePayloadMessage, ExternalPayload,
    HandshakeRequest, HandshakeResponse, PeerExchange, Report,
};
