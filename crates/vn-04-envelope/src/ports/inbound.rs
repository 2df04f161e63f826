//! # Inbound Ports (Driving Ports)

use crate::domain::envelope::AuthorizationToken;
use crate::domain::errors::AuthorizationError;
use crate::domain::network_load::{NetworkLoad, NetworkLoadSnapshot};
use crate::domain::payload::EnvelopePayloadMessage;

/// Mints and checks the anti-spam token of every envelope.
///
/// Production: `HashCashService` (service/hashcash.rs)
///
/// Both operations are CPU-bound and synchronous; async callers should run
/// `create_token` on a blocking thread.
pub trait AuthorizationService: Send + Sync {
    /// Produce a token for sending `payload` to the node at
    /// `receiver_address`, sized by the load that node advertised.
    fn create_token(
        &self,
        payload: &EnvelopePayloadMessage,
        receiver_load: &NetworkLoad,
        receiver_address: &str,
        message_counter: u32,
    ) -> Result<AuthorizationToken, AuthorizationError>;

    /// Check a received token against our own address and load.
    ///
    /// `connection_id` is `None` for handshake messages, which are not yet
    /// bound to a connection and always carry counter 0.
    fn authorize(
        &self,
        payload: &EnvelopePayloadMessage,
        token: &AuthorizationToken,
        my_load: &NetworkLoadSnapshot,
        connection_id: Option<&str>,
        my_address: &str,
    ) -> Result<(), AuthorizationError>;

    /// Drop counter state of a closed connection.
    fn forget_connection(&self, connection_id: &str);
}
