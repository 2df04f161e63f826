//! Capability exchange on a fresh socket.
//!
//! Handshake tokens carry counter 0 and are verified without connection
//! tracking. The initiator mints against the initial load since it knows
//! nothing about the peer yet; the responder mints against the load the
//! initiator advertised.

use std::sync::Arc;
use std::time::Duration;

use shared_types::Address;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;
use vn_04_envelope::{
    read_envelope, write_envelope, AuthorizationService, Capability, EnvelopePayloadMessage,
    HandshakeRequest, HandshakeResponse, NetworkEnvelope, NetworkLoad, NetworkLoadSnapshot,
};

use crate::errors::NodeError;
use crate::network::connection::mint_token;

pub(crate) struct HandshakeContext<'a> {
    pub auth: &'a Arc<dyn AuthorizationService>,
    pub loads: &'a NetworkLoadSnapshot,
    pub capability: &'a Capability,
    pub timeout: Duration,
}

/// Result of a completed handshake.
pub(crate) struct Established {
    pub peer: Capability,
    pub peer_load: NetworkLoad,
    pub reader: OwnedReadHalf,
    pub writer: OwnedWriteHalf,
}

/// Initiator side: send our capability, wait for the peer's.
pub(crate) async fn initiate(
    stream: TcpStream,
    peer_address: &Address,
    ctx: HandshakeContext<'_>,
) -> Result<Established, NodeError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = EnvelopePayloadMessage::HandshakeRequest(HandshakeRequest {
        capability: ctx.capability.clone(),
        network_load: ctx.loads.current(),
    });
    let (token, request) = mint_token(
        ctx.auth,
        request,
        NetworkLoad::INITIAL,
        peer_address.to_string(),
        0,
    )
    .await?;
    write_envelope(&mut writer, &NetworkEnvelope::new(token, request)).await?;

    let envelope = read_with_timeout(&mut reader, peer_address, ctx.timeout).await?;
    ctx.auth.authorize(
        &envelope.payload,
        &envelope.authorization_token,
        ctx.loads,
        None,
        &ctx.capability.address.to_string(),
    )?;
    let response = match envelope.payload {
        EnvelopePayloadMessage::HandshakeResponse(response) => response,
        other => {
            return Err(NodeError::handshake(
                peer_address,
                format!("expected HandshakeResponse, got {}", other.name()),
            ))
        }
    };
    if &response.capability.address != peer_address {
        debug!(
            dialed = %peer_address,
            announced = %response.capability.address,
            "[node] Peer announced a different address"
        );
    }

    Ok(Established {
        peer: response.capability,
        peer_load: response.network_load,
        reader,
        writer,
    })
}

/// Responder side: wait for a request, answer with our capability.
pub(crate) async fn accept(
    stream: TcpStream,
    ctx: HandshakeContext<'_>,
) -> Result<Established, NodeError> {
    let remote = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let (mut reader, mut writer) = stream.into_split();

    let envelope = read_with_timeout(&mut reader, &remote, ctx.timeout).await?;
    // The initiator could not have known our load.
    let initial = NetworkLoadSnapshot::new(NetworkLoad::INITIAL);
    ctx.auth.authorize(
        &envelope.payload,
        &envelope.authorization_token,
        &initial,
        None,
        &ctx.capability.address.to_string(),
    )?;
    let request = match envelope.payload {
        EnvelopePayloadMessage::HandshakeRequest(request) => request,
        other => {
            return Err(NodeError::handshake(
                &remote,
                format!("expected HandshakeRequest, got {}", other.name()),
            ))
        }
    };

    let response = EnvelopePayloadMessage::HandshakeResponse(HandshakeResponse {
        capability: ctx.capability.clone(),
        network_load: ctx.loads.current(),
    });
    let (token, response) = mint_token(
        ctx.auth,
        response,
        request.network_load,
        request.capability.address.to_string(),
        0,
    )
    .await?;
    write_envelope(&mut writer, &NetworkEnvelope::new(token, response)).await?;

    Ok(Established {
        peer: request.capability,
        peer_load: request.network_load,
        reader,
        writer,
    })
}

async fn read_with_timeout(
    reader: &mut OwnedReadHalf,
    peer: impl ToString,
    timeout: Duration,
) -> Result<NetworkEnvelope, NodeError> {
    let peer = peer.to_string();
    match tokio::time::timeout(timeout, read_envelope(reader)).await {
        Err(_) => Err(NodeError::Timeout {
            operation: format!("handshake with {peer}"),
            after_ms: timeout.as_millis() as u64,
        }),
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(None)) => Err(NodeError::handshake(peer, "closed during handshake")),
        Ok(Ok(Some((envelope, _)))) => Ok(envelope),
    }
}
