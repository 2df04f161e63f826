//! Routing of authorized payloads.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vn_02_data_store::DataRequest;
use vn_04_envelope::{CloseReason, EnvelopePayloadMessage, PeerExchange};

use crate::network::connection::Connection;
use crate::network::node::Node;

impl Node {
    pub(super) async fn dispatch(
        self: &Arc<Self>,
        connection: &Arc<Connection>,
        message: EnvelopePayloadMessage,
    ) {
        match message {
            EnvelopePayloadMessage::HandshakeRequest(_)
            | EnvelopePayloadMessage::HandshakeResponse(_) => {
                warn!(connection = connection.id(), "[node] Handshake on an established connection");
                connection.close(CloseReason::ProtocolViolation).await;
            }
            EnvelopePayloadMessage::CloseConnection { reason } => {
                info!(peer = %connection.peer_address(), ?reason, "[node] Peer closed connection");
                connection.shutdown().await;
            }
            EnvelopePayloadMessage::PeerExchangeRequest(exchange) => {
                let peers = self.sample_peers(Some(connection.peer_address()));
                self.remember(exchange.peers);
                let response = PeerExchange {
                    nonce: exchange.nonce,
                    peers,
                };
                reply(connection, EnvelopePayloadMessage::PeerExchangeResponse(response)).await;
            }
            EnvelopePayloadMessage::PeerExchangeResponse(exchange) => {
                self.remember(exchange.peers.iter().cloned());
                let nonce = exchange.nonce;
                self.resolve(connection, nonce, EnvelopePayloadMessage::PeerExchangeResponse(exchange));
            }
            EnvelopePayloadMessage::Ping { nonce } => {
                reply(connection, EnvelopePayloadMessage::Pong { request_nonce: nonce }).await;
            }
            EnvelopePayloadMessage::Pong { request_nonce } => {
                self.resolve(connection, request_nonce, EnvelopePayloadMessage::Pong { request_nonce });
            }
            EnvelopePayloadMessage::InventoryRequest(request) => {
                let inventory = Arc::clone(&self.services.inventory);
                // Building a response walks the whole store.
                match tokio::task::spawn_blocking(move || inventory.handle_request(request)).await {
                    Ok(Ok(response)) => {
                        reply(connection, EnvelopePayloadMessage::InventoryResponse(response)).await;
                    }
                    Ok(Err(e)) => {
                        warn!(peer = %connection.peer_address(), error = %e, "[node] Inventory request rejected");
                    }
                    Err(e) => warn!(error = %e, "[node] Inventory task failed"),
                }
            }
            EnvelopePayloadMessage::InventoryResponse(response) => {
                let nonce = response.request_nonce;
                self.resolve(connection, nonce, EnvelopePayloadMessage::InventoryResponse(response));
            }
            EnvelopePayloadMessage::DataRequest(request) => self.ingest(connection, request),
            EnvelopePayloadMessage::NetworkLoadExchangeRequest {
                nonce,
                network_load,
            } => {
                connection.set_peer_load(network_load);
                let response = EnvelopePayloadMessage::NetworkLoadExchangeResponse {
                    request_nonce: nonce,
                    network_load: self.services.loads.current(),
                };
                reply(connection, response).await;
            }
            EnvelopePayloadMessage::NetworkLoadExchangeResponse {
                request_nonce,
                network_load,
            } => {
                connection.set_peer_load(network_load);
                let response = EnvelopePayloadMessage::NetworkLoadExchangeResponse {
                    request_nonce,
                    network_load,
                };
                self.resolve(connection, request_nonce, response);
            }
            EnvelopePayloadMessage::ReportRequest { nonce } => {
                let response = EnvelopePayloadMessage::ReportResponse {
                    request_nonce: nonce,
                    report: self.report(),
                };
                reply(connection, response).await;
            }
            EnvelopePayloadMessage::ReportResponse {
                request_nonce,
                report,
            } => {
                let response = EnvelopePayloadMessage::ReportResponse {
                    request_nonce,
                    report,
                };
                self.resolve(connection, request_nonce, response);
            }
            message @ (EnvelopePayloadMessage::ConfidentialMessage(_)
            | EnvelopePayloadMessage::Ack { .. }
            | EnvelopePayloadMessage::External(_)) => self.notify(connection, &message),
        }
    }

    /// Store a pushed request and gossip it on if it changed anything.
    ///
    /// Duplicates and stale versions stop here, which ends the flood.
    fn ingest(self: &Arc<Self>, connection: &Arc<Connection>, request: DataRequest) {
        match self.services.store.apply(request.clone()) {
            Ok(outcome) if outcome.is_stored() => {
                let node = Arc::clone(self);
                let source = connection.peer_address().clone();
                tokio::spawn(async move {
                    let forwarded = node
                        .broadcast_except(EnvelopePayloadMessage::DataRequest(request), Some(&source))
                        .await;
                    debug!(%source, forwarded, "[node] Forwarded data request");
                });
            }
            Ok(outcome) => debug!(?outcome, kind = %request.kind(), "[node] Data request not stored"),
            Err(e) => debug!(
                peer = %connection.peer_address(),
                error = %e,
                "[node] Data request rejected"
            ),
        }
    }

    fn notify(&self, connection: &Arc<Connection>, message: &EnvelopePayloadMessage) {
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            debug!(message = message.name(), "[node] No listener for message");
        }
        for listener in listeners {
            listener.on_message(connection, message);
        }
    }
}

async fn reply(connection: &Connection, payload: EnvelopePayloadMessage) {
    let name = payload.name();
    if let Err(e) = connection.send(payload).await {
        debug!(connection = connection.id(), message = name, error = %e, "[node] Reply failed");
    }
}
