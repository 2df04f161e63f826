//! Ports of the envelope subsystem.

pub mod inbound;
pub mod outbound;

pub use inbound::AuthorizationService;
pub use outbound::ExtensionDecoder;
