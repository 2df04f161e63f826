//! # Handlers
//!
//! Services that react to node traffic and store events.

pub mod confidential;
pub mod network_load;

pub use confidential::{
    ConfidentialListener, ConfidentialMessageService, Delivery, ReceivedMessage, SendOutcome,
};
pub use network_load::NetworkLoadService;
