//! One authenticated link to a peer.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use shared_types::Address;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use vn_04_envelope::{
    write_envelope, AuthorizationService, AuthorizationToken, Capability, CloseReason,
    EnvelopePayloadMessage, NetworkEnvelope, NetworkLoad,
};

use crate::errors::NodeError;
use crate::network::metrics::TrafficMetrics;

/// Upper bound on the courtesy `CloseConnection` write.
const CLOSE_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// Write half plus the last counter put on the wire. Both sit behind one
/// lock so counters reach the peer in increasing order.
struct Outbox {
    writer: OwnedWriteHalf,
    counter: u32,
}

pub struct Connection {
    id: String,
    direction: Direction,
    peer: Capability,
    peer_load: RwLock<NetworkLoad>,
    outbox: Mutex<Outbox>,
    auth: Arc<dyn AuthorizationService>,
    metrics: Arc<TrafficMetrics>,
    closed: AtomicBool,
    close_signal: watch::Sender<bool>,
}

impl Connection {
    pub(crate) fn new(
        direction: Direction,
        peer: Capability,
        peer_load: NetworkLoad,
        writer: OwnedWriteHalf,
        auth: Arc<dyn AuthorizationService>,
        metrics: Arc<TrafficMetrics>,
    ) -> Self {
        let (close_signal, _) = watch::channel(false);
        Self {
            id: format!("{}-{}", peer.address, hex::encode(rand::random::<[u8; 4]>())),
            direction,
            peer,
            peer_load: RwLock::new(peer_load),
            outbox: Mutex::new(Outbox { writer, counter: 0 }),
            auth,
            metrics,
            closed: AtomicBool::new(false),
            close_signal,
        }
    }

    /// Unique per socket; two connections to the same peer differ.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn peer(&self) -> &Capability {
        &self.peer
    }

    pub fn peer_address(&self) -> &Address {
        &self.peer.address
    }

    /// The load the peer last reported. Outbound tokens are minted against it.
    pub fn peer_load(&self) -> NetworkLoad {
        *self.peer_load.read()
    }

    pub(crate) fn set_peer_load(&self, load: NetworkLoad) {
        *self.peer_load.write() = load;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn subscribe_close(&self) -> watch::Receiver<bool> {
        self.close_signal.subscribe()
    }

    /// Authorize and write one payload.
    pub async fn send(&self, payload: EnvelopePayloadMessage) -> Result<(), NodeError> {
        if self.is_closed() {
            return Err(NodeError::ConnectionClosed(self.id.clone()));
        }
        let mut outbox = self.outbox.lock().await;
        let Some(counter) = outbox.counter.checked_add(1) else {
            drop(outbox);
            // No counter is left to authorize a close notice with.
            warn!(
                connection = %self.id,
                reason = ?CloseReason::ProtocolViolation,
                "[node] Message counter exhausted, closing"
            );
            self.shutdown().await;
            return Err(NodeError::CounterExhausted(self.id.clone()));
        };
        let (token, payload) = mint_token(
            &self.auth,
            payload,
            self.peer_load(),
            self.peer.address.to_string(),
            counter,
        )
        .await?;
        let name = payload.name();
        let envelope = NetworkEnvelope::new(token, payload);
        let size = write_envelope(&mut outbox.writer, &envelope).await?;
        outbox.counter = counter;
        drop(outbox);

        self.metrics.record_sent(size);
        debug!(connection = %self.id, message = name, size, counter, "[node] Sent");
        Ok(())
    }

    /// Tell the peer why, then shut the socket. Repeated calls are no-ops.
    pub async fn close(&self, reason: CloseReason) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let farewell = EnvelopePayloadMessage::CloseConnection {
            reason: reason.clone(),
        };
        match tokio::time::timeout(CLOSE_WRITE_TIMEOUT, self.send(farewell)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(connection = %self.id, error = %e, "[node] Close notice not sent"),
            Err(_) => debug!(connection = %self.id, "[node] Close notice timed out"),
        }
        self.shutdown().await;
        debug!(connection = %self.id, ?reason, "[node] Connection closed");
    }

    #[cfg(test)]
    pub(crate) async fn set_counter(&self, counter: u32) {
        self.outbox.lock().await.counter = counter;
    }

    /// Mark closed and shut the write half without a notice.
    pub(crate) async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.close_signal.send(true);
        let mut outbox = self.outbox.lock().await;
        let _ = outbox.writer.shutdown().await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("peer", &self.peer.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Mint a token off the async workers; proof of work can take a while.
///
/// The payload travels into the blocking task and back to avoid a clone.
pub(crate) async fn mint_token(
    auth: &Arc<dyn AuthorizationService>,
    payload: EnvelopePayloadMessage,
    receiver_load: NetworkLoad,
    receiver_address: String,
    counter: u32,
) -> Result<(AuthorizationToken, EnvelopePayloadMessage), NodeError> {
    let auth = Arc::clone(auth);
    let (token, payload) = tokio::task::spawn_blocking(move || {
        let token = auth.create_token(&payload, &receiver_load, &receiver_address, counter);
        (token, payload)
    })
    .await?;
    Ok((token?, payload))
}
