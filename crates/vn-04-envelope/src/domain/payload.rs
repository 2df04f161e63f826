//! The closed set of messages an envelope can carry.

use serde::{Deserialize, Serialize};
use shared_crypto::ConfidentialData;
use shared_types::{Address, TransportType};
use vn_02_data_store::{DataRequest, StoreCounts};
use vn_03_inventory::{InventoryRequest, InventoryResponse};

use super::network_load::NetworkLoad;

/// What a node announces about itself in the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Address the node is reachable at on this transport.
    pub address: Address,
    pub supported_transports: Vec<TransportType>,
}

impl Capability {
    pub fn new(address: Address, supported_transports: Vec<TransportType>) -> Self {
        Self {
            address,
            supported_transports,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub capability: Capability,
    pub network_load: NetworkLoad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub capability: Capability,
    pub network_load: NetworkLoad,
}

/// Why a peer hung up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Shutdown,
    DuplicateConnection,
    ProtocolViolation,
    Unauthorized,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerExchange {
    pub nonce: u64,
    pub peers: Vec<Address>,
}

/// A sealed message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialMessage {
    pub sealed: ConfidentialData,
    /// Hex key id of the recipient, so a node hosting several identities
    /// can pick the right key without trial decryption.
    pub receiver_key_id: String,
}

/// Node health summary answered to a report request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub store: StoreCounts,
    pub num_connections: usize,
    pub network_load: NetworkLoad,
}

/// A payload kind defined outside the core, carried as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPayload {
    pub type_id: String,
    pub bytes: Vec<u8>,
}

impl ExternalPayload {
    pub fn new(type_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            type_id: type_id.into(),
            bytes,
        }
    }
}

/// Every message on the wire.
///
/// Variant order is part of the wire format; append new variants at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnvelopePayloadMessage {
    HandshakeRequest(HandshakeRequest),
    HandshakeResponse(HandshakeResponse),
    CloseConnection { reason: CloseReason },
    PeerExchangeRequest(PeerExchange),
    PeerExchangeResponse(PeerExchange),
    Ping { nonce: u64 },
    Pong { request_nonce: u64 },
    ConfidentialMessage(ConfidentialMessage),
    Ack { message_id: String },
    InventoryRequest(InventoryRequest),
    InventoryResponse(InventoryResponse),
    DataRequest(DataRequest),
    NetworkLoadExchangeRequest { nonce: u64, network_load: NetworkLoad },
    NetworkLoadExchangeResponse { request_nonce: u64, network_load: NetworkLoad },
    ReportRequest { nonce: u64 },
    ReportResponse { request_nonce: u64, report: Report },
    External(ExternalPayload),
}

impl EnvelopePayloadMessage {
    /// Relative anti-spam weight in `(0, 1]`.
    ///
    /// Scales the proof-of-work difficulty. Unsolicited broadcasts that land
    /// in every store cost the most; control traffic costs the least.
    pub fn cost_factor(&self) -> f64 {
        match self {
            Self::HandshakeRequest(_) | Self::HandshakeResponse(_) => 0.05,
            Self::CloseConnection { .. } | Self::Ping { .. } | Self::Pong { .. } => 0.01,
            Self::NetworkLoadExchangeRequest { .. } | Self::NetworkLoadExchangeResponse { .. } => 0.01,
            Self::ReportRequest { .. } | Self::ReportResponse { .. } | Self::Ack { .. } => 0.05,
            Self::PeerExchangeRequest(_) | Self::PeerExchangeResponse(_) => 0.1,
            Self::InventoryResponse(_) => 0.1,
            Self::ConfidentialMessage(_) => 0.2,
            Self::InventoryRequest(_) => 0.25,
            Self::External(_) => 0.5,
            Self::DataRequest(request) => match request {
                DataRequest::AddAppendOnly(_) => 1.0,
                DataRequest::RemoveAuthenticated(_)
                | DataRequest::RemoveMailbox(_) => 0.1,
                _ => 0.5,
            },
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HandshakeRequest(_) => "HandshakeRequest",
            Self::HandshakeResponse(_) => "HandshakeResponse",
            Self::CloseConnection { .. } => "CloseConnection",
            Self::PeerExchangeRequest(_) => "PeerExchangeRequest",
            Self::PeerExchangeResponse(_) => "PeerExchangeResponse",
            Self::Ping { .. } => "Ping",
            Self::Pong { .. } => "Pong",
            Self::ConfidentialMessage(_) => "ConfidentialMessage",
            Self::Ack { .. } => "Ack",
            Self::InventoryRequest(_) => "InventoryRequest",
            Self::InventoryResponse(_) => "InventoryResponse",
            Self::DataRequest(_) => "DataRequest",
            Self::NetworkLoadExchangeRequest { .. } => "NetworkLoadExchangeRequest",
            Self::NetworkLoadExchangeResponse { .. } => "NetworkLoadExchangeResponse",
            Self::ReportRequest { .. } => "ReportRequest",
            Self::ReportResponse { .. } => "ReportResponse",
            Self::External(_) => "External",
        }
    }

    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            EnvelopePayloadMessage::HandshakeRequest(_) | EnvelopePayloadMessage::HandshakeResponse(_)
        )
    }
}
