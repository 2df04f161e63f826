//! # Envelope Subsystem
//!
//! Every message between nodes is a `NetworkEnvelope`:
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | `version` | `i32` | first four bytes, checked before the rest is parsed |
//! | `authorization_token` | `AuthorizationToken` | proof of work plus message counter |
//! | `payload` | `EnvelopePayloadMessage` | closed union, one open `External` arm |
//!
//! Tokens are verified before a payload reaches the store or any other
//! consumer. A failed check drops the message with no side effects.
//!
//! ## Architecture
//!
//! - **Domain Layer:** envelope, payload union, network load, errors
//! - **Ports Layer:** `AuthorizationService`, `ExtensionDecoder`
//! - **Service Layer:** codec, `ExtensionRegistry`, `HashCashService`
//! - **Adapters Layer:** length-prefixed framing over async streams
//!
//! ## Example
//!
//! ```
//! use vn_04_envelope::{
//!     decode, encode, AuthorizationService, EnvelopePayloadMessage, HashCashService,
//!     NetworkEnvelope, NetworkLoad, NetworkLoadSnapshot,
//! };
//!
//! let auth = HashCashService::new(true);
//! let ping = EnvelopePayloadMessage::Ping { nonce: 7 };
//! let token = auth.create_token(&ping, &NetworkLoad::INITIAL, "127.0.0.1:9000", 1).unwrap();
//!
//! let bytes = encode(&NetworkEnvelope::new(token, ping)).unwrap();
//! let envelope = decode(&bytes).unwrap();
//! let load = NetworkLoadSnapshot::default();
//! assert!(auth
//!     .authorize(&envelope.payload, &envelope.authorization_token, &load, Some("c1"), "127.0.0.1:9000")
//!     .is_ok());
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{read_envelope, read_frame, write_envelope, write_frame};
pub use domain::{
    AuthorizationError, AuthorizationToken, Capability, CloseReason, ConfidentialMessage,
    EnvelopeError, EnvelopePayloadMessage, ExternalPayload, HandshakeRequest, HandshakeResponse,
    LoadInputs, NetworkEnvelope, NetworkLoad, NetworkLoadSnapshot, PeerExchange, Report,
    MAX_FRAME_SIZE, MIN_SUPPORTED_VERSION, PROTOCOL_VERSION,
};
pub use ports::{AuthorizationService, ExtensionDecoder};
pub use service::{decode, encode, payload_digest, ExtensionRegistry, HashCashService};
