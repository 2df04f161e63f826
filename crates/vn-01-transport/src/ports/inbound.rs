//! Inbound port: what the node layer asks of a transport.

use crate::domain::cancel::CancelToken;
use crate::domain::errors::TransportError;
use crate::domain::state::{ServerSocket, TransportState};
use async_trait::async_trait;
use shared_types::{Address, TransportType};
use tokio::net::TcpStream;

/// A network stack able to accept and open connections.
///
/// Implementations are shared behind `Arc` and must tolerate concurrent calls.
#[async_trait]
pub trait TransportService: Send + Sync {
    /// Which stack this is.
    fn transport_type(&self) -> TransportType;

    /// Current lifecycle state.
    fn state(&self) -> TransportState;

    /// Bring the transport up. Idempotent: a second call returns `Ok(true)`
    /// without doing anything.
    async fn initialize(&self) -> Result<bool, TransportError>;

    /// Bind an inbound endpoint for `server_id`.
    ///
    /// For Tor this publishes a hidden service and waits for the descriptor
    /// upload; for I2P it opens a SAM session and forwards it locally.
    async fn get_server_socket(
        &self,
        port: u16,
        server_id: &str,
    ) -> Result<ServerSocket, TransportError>;

    /// Open an outbound connection to `address`.
    async fn get_socket(
        &self,
        address: &Address,
        cancel: &CancelToken,
    ) -> Result<TcpStream, TransportError>;

    /// The published address of `server_id`, once known.
    fn get_server_address(&self, server_id: &str) -> Option<Address>;

    /// Tear down sessions and published services.
    async fn shutdown(&self) -> Result<(), TransportError>;
}
