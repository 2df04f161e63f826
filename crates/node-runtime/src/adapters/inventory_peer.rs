//! Connection-backed implementation of the inventory outbound port.

use std::sync::Arc;

use async_trait::async_trait;
use vn_03_inventory::{InventoryError, InventoryPeer, InventoryRequest, InventoryResponse};
use vn_04_envelope::EnvelopePayloadMessage;

use crate::errors::NodeError;
use crate::network::{Connection, Node};

/// Lets the inventory service reconcile with one connected peer.
///
/// Requests and responses travel as ordinary authorized envelopes; the
/// node's pending-request table matches the response by nonce.
pub struct ConnectionInventoryPeer {
    node: Arc<Node>,
    connection: Arc<Connection>,
}

impl ConnectionInventoryPeer {
    pub fn new(node: Arc<Node>, connection: Arc<Connection>) -> Self {
        Self { node, connection }
    }
}

#[async_trait]
impl InventoryPeer for ConnectionInventoryPeer {
    fn label(&self) -> String {
        self.connection.peer_address().to_string()
    }

    async fn request_inventory(
        &self,
        request: InventoryRequest,
    ) -> Result<InventoryResponse, InventoryError> {
        let nonce = request.nonce;
        let payload = EnvelopePayloadMessage::InventoryRequest(request);
        match self.node.request(&self.connection, payload, nonce).await {
            Ok(EnvelopePayloadMessage::InventoryResponse(response)) => Ok(response),
            Ok(other) => Err(InventoryError::peer(
                self.label(),
                format!("unexpected {}", other.name()),
            )),
            Err(NodeError::Timeout { after_ms, .. }) => Err(InventoryError::Timeout {
                peer: self.label(),
                after_ms,
            }),
            Err(e) => Err(InventoryError::peer(self.label(), e)),
        }
    }
}
