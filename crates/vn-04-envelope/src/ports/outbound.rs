//! # Outbound Ports (Driven Ports)

use crate::domain::errors::EnvelopeError;
use std::any::Any;

/// Decoder for one external payload type, supplied by the embedding
/// application.
pub trait ExtensionDecoder: Send + Sync {
    /// Payload type this decoder handles, as carried in `ExternalPayload::type_id`.
    fn payload_type(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>, EnvelopeError>;
}
