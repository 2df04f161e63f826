//! A node: one transport's listener, its connections and request routing.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use rand::seq::IteratorRandom;
use shared_types::{Address, TransportType};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vn_01_transport::{CancelToken, TransportService};
use vn_02_data_store::DataStore;
use vn_03_inventory::{InventoryPeer, InventoryService};
use vn_04_envelope::{
    read_envelope, AuthorizationService, Capability, CloseReason, EnvelopePayloadMessage,
    NetworkEnvelope, NetworkLoad, NetworkLoadSnapshot, PeerExchange, Report,
};

use crate::adapters::ConnectionInventoryPeer;
use crate::container::config::NodeConfig;
use crate::errors::NodeError;
use crate::network::connection::{Connection, Direction};
use crate::network::handshake::{self, Established, HandshakeContext};
use crate::network::metrics::TrafficMetrics;

/// Addresses handed out per peer exchange.
pub const MAX_PEERS_PER_EXCHANGE: usize = 10;

/// Cap on remembered peer addresses.
pub const MAX_KNOWN_PEERS: usize = 1_000;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Receives payloads the node does not handle itself.
///
/// Called from the connection's read loop; implementations must not block.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, connection: &Arc<Connection>, message: &EnvelopePayloadMessage);
}

#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub handshake_timeout: Duration,
    /// How long a request waits for its response.
    pub request_timeout: Duration,
    pub max_connections: usize,
}

impl NodeSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            handshake_timeout: config.network.handshake_timeout,
            request_timeout: config.inventory.request_timeout,
            max_connections: config.network.max_connections,
        }
    }
}

/// State shared by every node of one runtime.
#[derive(Clone)]
pub struct NodeServices {
    pub store: Arc<DataStore>,
    pub inventory: Arc<InventoryService<DataStore>>,
    pub auth: Arc<dyn AuthorizationService>,
    pub loads: Arc<NetworkLoadSnapshot>,
    pub metrics: Arc<TrafficMetrics>,
    pub shutdown: watch::Receiver<bool>,
}

type PendingKey = (String, u64);

pub struct Node {
    pub(super) transport: Arc<dyn TransportService>,
    pub(super) supported_transports: Vec<TransportType>,
    pub(super) services: NodeServices,
    pub(super) settings: NodeSettings,
    pub(super) capability: RwLock<Option<Capability>>,
    pub(super) connections: RwLock<HashMap<Address, Arc<Connection>>>,
    pub(super) known_peers: RwLock<BTreeSet<Address>>,
    pub(super) pending: Mutex<HashMap<PendingKey, oneshot::Sender<EnvelopePayloadMessage>>>,
    pub(super) listeners: RwLock<Vec<Arc<dyn MessageListener>>>,
    accept_tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Drops the pending entry when the request finishes, times out or is
/// cancelled.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<PendingKey, oneshot::Sender<EnvelopePayloadMessage>>>,
    key: PendingKey,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.key);
    }
}

impl Node {
    pub fn new(
        transport: Arc<dyn TransportService>,
        supported_transports: Vec<TransportType>,
        services: NodeServices,
        settings: NodeSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            supported_transports,
            services,
            settings,
            capability: RwLock::new(None),
            connections: RwLock::new(HashMap::new()),
            known_peers: RwLock::new(BTreeSet::new()),
            pending: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            accept_tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport.transport_type()
    }

    /// What this node announces; `None` until [`Node::start`] succeeds.
    pub fn capability(&self) -> Option<Capability> {
        self.capability.read().clone()
    }

    pub fn address(&self) -> Option<Address> {
        self.capability.read().as_ref().map(|c| c.address.clone())
    }

    fn require_capability(&self) -> Result<Capability, NodeError> {
        self.capability()
            .ok_or_else(|| NodeError::NotStarted(self.transport_type()))
    }

    pub fn add_listener(&self, listener: Arc<dyn MessageListener>) {
        self.listeners.write().push(listener);
    }

    pub fn connection(&self, address: &Address) -> Option<Arc<Connection>> {
        self.connections.read().get(address).cloned()
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn known_peers(&self) -> Vec<Address> {
        self.known_peers.read().iter().cloned().collect()
    }

    // =========================================================================
    // LISTENING
    // =========================================================================

    /// Bind the server socket and start accepting peers.
    pub async fn start(self: &Arc<Self>, port: u16, server_id: &str) -> Result<Address, NodeError> {
        let server = self.transport.get_server_socket(port, server_id).await?;
        let address = server.address.clone();
        *self.capability.write() = Some(Capability::new(
            address.clone(),
            self.supported_transports.clone(),
        ));

        let node = Arc::clone(self);
        let handle = tokio::spawn(async move { node.accept_loop(server.listener).await });
        self.accept_tasks.lock().push(handle);

        info!(transport = %self.transport_type(), %address, "[node] Listening");
        Ok(address)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown = self.services.shutdown.clone();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let node = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = node.handle_inbound(stream).await {
                                debug!(%remote, error = %e, "[node] Inbound connection failed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "[node] Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
        debug!(transport = %self.transport_type(), "[node] Accept loop stopped");
    }

    async fn handle_inbound(self: Arc<Self>, stream: TcpStream) -> Result<(), NodeError> {
        if self.connection_count() >= self.settings.max_connections {
            return Err(NodeError::TooManyConnections(self.settings.max_connections));
        }
        let capability = self.require_capability()?;
        let established = handshake::accept(stream, self.handshake_context(&capability)).await?;
        let (connection, reader) = self.register(Direction::Inbound, established);
        self.read_loop(connection, reader).await;
        Ok(())
    }

    // =========================================================================
    // DIALING
    // =========================================================================

    /// Reuse the open connection to `address` or dial a new one.
    pub async fn connect(self: &Arc<Self>, address: &Address) -> Result<Arc<Connection>, NodeError> {
        if let Some(existing) = self.connection(address) {
            return Ok(existing);
        }
        let capability = self.require_capability()?;
        if *address == capability.address {
            return Err(NodeError::NoRoute(format!("{address} is this node")));
        }
        if address.transport_type() != self.transport_type() {
            return Err(NodeError::NoRoute(format!(
                "{address} is not reachable over {}",
                self.transport_type()
            )));
        }
        if self.connection_count() >= self.settings.max_connections {
            return Err(NodeError::TooManyConnections(self.settings.max_connections));
        }

        let stream = self.transport.get_socket(address, &CancelToken::never()).await?;
        let established =
            handshake::initiate(stream, address, self.handshake_context(&capability)).await?;
        let (connection, reader) = self.register(Direction::Outbound, established);

        let node = Arc::clone(self);
        let reading = Arc::clone(&connection);
        tokio::spawn(async move { node.read_loop(reading, reader).await });
        Ok(connection)
    }

    fn handshake_context<'a>(&'a self, capability: &'a Capability) -> HandshakeContext<'a> {
        HandshakeContext {
            auth: &self.services.auth,
            loads: &self.services.loads,
            capability,
            timeout: self.settings.handshake_timeout,
        }
    }

    fn register(
        &self,
        direction: Direction,
        established: Established,
    ) -> (Arc<Connection>, OwnedReadHalf) {
        let Established {
            peer,
            peer_load,
            reader,
            writer,
        } = established;
        let connection = Arc::new(Connection::new(
            direction,
            peer,
            peer_load,
            writer,
            Arc::clone(&self.services.auth),
            Arc::clone(&self.services.metrics),
        ));
        let address = connection.peer_address().clone();

        // The newest socket wins the slot; an older one keeps reading until
        // its peer drops it.
        if let Some(previous) = self
            .connections
            .write()
            .insert(address.clone(), Arc::clone(&connection))
        {
            debug!(peer = %address, previous = previous.id(), "[node] Replaced connection");
        }
        self.remember(std::iter::once(address.clone()));

        info!(
            peer = %address,
            %direction,
            connection = connection.id(),
            "[node] Connection established"
        );
        (connection, reader)
    }

    // =========================================================================
    // READING
    // =========================================================================

    async fn read_loop(self: Arc<Self>, connection: Arc<Connection>, mut reader: OwnedReadHalf) {
        let mut closed = connection.subscribe_close();
        let mut shutdown = self.services.shutdown.clone();
        loop {
            let read = tokio::select! {
                _ = closed.changed() => break,
                _ = shutdown.changed() => break,
                read = read_envelope(&mut reader) => read,
            };
            match read {
                Ok(Some((envelope, size))) => {
                    self.services.metrics.record_received(size);
                    self.handle_envelope(&connection, envelope).await;
                }
                Ok(None) => {
                    debug!(connection = connection.id(), "[node] Peer hung up");
                    break;
                }
                Err(e) if e.is_protocol_violation() => {
                    warn!(connection = connection.id(), error = %e, "[node] Protocol violation");
                    connection.close(CloseReason::ProtocolViolation).await;
                    break;
                }
                Err(e) => {
                    debug!(connection = connection.id(), error = %e, "[node] Read failed");
                    break;
                }
            }
        }
        self.remove_connection(&connection).await;
    }

    /// Verify the token, then route the payload. Unauthorized payloads are
    /// dropped before anything else sees them.
    async fn handle_envelope(self: &Arc<Self>, connection: &Arc<Connection>, envelope: NetworkEnvelope) {
        let Some(my_address) = self.address() else {
            return;
        };
        let NetworkEnvelope {
            authorization_token,
            payload,
            ..
        } = envelope;
        if let Err(e) = self.services.auth.authorize(
            &payload,
            &authorization_token,
            &self.services.loads,
            Some(connection.id()),
            &my_address.to_string(),
        ) {
            debug!(
                connection = connection.id(),
                message = payload.name(),
                error = %e,
                "[node] Dropped unauthorized message"
            );
            return;
        }
        self.dispatch(connection, payload).await;
    }

    async fn remove_connection(&self, connection: &Arc<Connection>) {
        {
            let mut connections = self.connections.write();
            let current = connections
                .get(connection.peer_address())
                .is_some_and(|c| c.id() == connection.id());
            if current {
                connections.remove(connection.peer_address());
            }
        }
        // Waiting requests fail fast instead of timing out.
        self.pending.lock().retain(|(id, _), _| id != connection.id());
        self.services.auth.forget_connection(connection.id());
        connection.shutdown().await;
        info!(
            peer = %connection.peer_address(),
            connection = connection.id(),
            "[node] Connection removed"
        );
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Send `payload` and wait for the response carrying `nonce`.
    pub async fn request(
        &self,
        connection: &Connection,
        payload: EnvelopePayloadMessage,
        nonce: u64,
    ) -> Result<EnvelopePayloadMessage, NodeError> {
        let key = (connection.id().to_string(), nonce);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(key.clone(), tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            key,
        };

        let name = payload.name();
        connection.send(payload).await?;

        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(NodeError::ConnectionClosed(connection.id().to_string())),
            Err(_) => Err(NodeError::Timeout {
                operation: format!("{name} to {}", connection.peer_address()),
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Hand a response to whoever waits for it.
    pub(super) fn resolve(&self, connection: &Connection, nonce: u64, response: EnvelopePayloadMessage) {
        let waiter = self
            .pending
            .lock()
            .remove(&(connection.id().to_string(), nonce));
        match waiter {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => debug!(
                connection = connection.id(),
                nonce,
                message = response.name(),
                "[node] Unsolicited response"
            ),
        }
    }

    /// Round-trip time of one ping.
    pub async fn ping(&self, connection: &Connection) -> Result<Duration, NodeError> {
        let nonce = rand::random();
        let started = Instant::now();
        match self
            .request(connection, EnvelopePayloadMessage::Ping { nonce }, nonce)
            .await?
        {
            EnvelopePayloadMessage::Pong { .. } => Ok(started.elapsed()),
            other => Err(unexpected(connection, &other)),
        }
    }

    pub async fn request_report(&self, connection: &Connection) -> Result<Report, NodeError> {
        let nonce = rand::random();
        match self
            .request(connection, EnvelopePayloadMessage::ReportRequest { nonce }, nonce)
            .await?
        {
            EnvelopePayloadMessage::ReportResponse { report, .. } => Ok(report),
            other => Err(unexpected(connection, &other)),
        }
    }

    /// Swap peer samples. Returned addresses are already remembered.
    pub async fn exchange_peers(&self, connection: &Connection) -> Result<Vec<Address>, NodeError> {
        let nonce = rand::random();
        let request = EnvelopePayloadMessage::PeerExchangeRequest(PeerExchange {
            nonce,
            peers: self.sample_peers(Some(connection.peer_address())),
        });
        match self.request(connection, request, nonce).await? {
            EnvelopePayloadMessage::PeerExchangeResponse(exchange) => Ok(exchange.peers),
            other => Err(unexpected(connection, &other)),
        }
    }

    /// Tell one peer our load and learn theirs.
    pub async fn exchange_load(&self, connection: &Connection) -> Result<NetworkLoad, NodeError> {
        let nonce = rand::random();
        let request = EnvelopePayloadMessage::NetworkLoadExchangeRequest {
            nonce,
            network_load: self.services.loads.current(),
        };
        match self.request(connection, request, nonce).await? {
            EnvelopePayloadMessage::NetworkLoadExchangeResponse { network_load, .. } => {
                Ok(network_load)
            }
            other => Err(unexpected(connection, &other)),
        }
    }

    // =========================================================================
    // FAN-OUT
    // =========================================================================

    /// Send to every connection; returns how many sends succeeded.
    pub async fn broadcast(&self, payload: EnvelopePayloadMessage) -> usize {
        self.broadcast_except(payload, None).await
    }

    pub async fn broadcast_except(
        &self,
        payload: EnvelopePayloadMessage,
        except: Option<&Address>,
    ) -> usize {
        let targets: Vec<Arc<Connection>> = self
            .connections()
            .into_iter()
            .filter(|c| Some(c.peer_address()) != except)
            .collect();
        let results = join_all(targets.iter().map(|c| c.send(payload.clone()))).await;

        let mut sent = 0;
        for (connection, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => sent += 1,
                Err(e) => debug!(
                    peer = %connection.peer_address(),
                    error = %e,
                    "[node] Broadcast send failed"
                ),
            }
        }
        sent
    }

    /// Adapters reconciling the store with each connected peer.
    pub fn inventory_peers(self: &Arc<Self>) -> Vec<Arc<dyn InventoryPeer>> {
        self.connections()
            .into_iter()
            .map(|connection| {
                Arc::new(ConnectionInventoryPeer::new(Arc::clone(self), connection))
                    as Arc<dyn InventoryPeer>
            })
            .collect()
    }

    pub async fn close_all(&self, reason: CloseReason) {
        let connections = self.connections();
        join_all(connections.iter().map(|c| c.close(reason.clone()))).await;
        self.connections.write().clear();
    }

    /// Close every connection and stop accepting.
    pub async fn shutdown(&self) {
        self.close_all(CloseReason::Shutdown).await;
        for task in self.accept_tasks.lock().drain(..) {
            task.abort();
        }
        info!(transport = %self.transport_type(), "[node] Stopped");
    }

    pub fn report(&self) -> Report {
        Report {
            store: self.services.store.counts(),
            num_connections: self.connection_count(),
            network_load: self.services.loads.current(),
        }
    }

    // =========================================================================
    // PEER BOOK
    // =========================================================================

    /// Remember addresses on this node's transport, except our own.
    pub(super) fn remember(&self, peers: impl IntoIterator<Item = Address>) {
        let own = self.address();
        let transport = self.transport_type();
        let mut known = self.known_peers.write();
        for peer in peers {
            if known.len() >= MAX_KNOWN_PEERS {
                break;
            }
            if Some(&peer) != own.as_ref() && peer.transport_type() == transport {
                known.insert(peer);
            }
        }
    }

    /// Random known peers, excluding `except`.
    pub(super) fn sample_peers(&self, except: Option<&Address>) -> Vec<Address> {
        self.known_peers
            .read()
            .iter()
            .filter(|peer| Some(*peer) != except)
            .cloned()
            .choose_multiple(&mut rand::thread_rng(), MAX_PEERS_PER_EXCHANGE)
    }
}

fn unexpected(connection: &Connection, message: &EnvelopePayloadMessage) -> NodeError {
    NodeError::UnexpectedResponse {
        peer: connection.peer_address().to_string(),
        message: message.name(),
    }
}
