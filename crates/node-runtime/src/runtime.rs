//! The node runtime: one [`Node`] per enabled transport over a shared store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shared_crypto::Ed25519KeyPair;
use shared_types::{NetworkId, SystemTimeSource, TransportType};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vn_01_transport::{CancelToken, TransportRegistry};
use vn_02_data_store::{
    spawn_sweeper, DataRequest, DataStore, FilePersistence, StorageOutcome, StoreConfig,
};
use vn_03_inventory::{InventoryError, InventoryPeer, InventoryService, ReconcileReport};
use vn_04_envelope::{
    AuthorizationService, EnvelopePayloadMessage, HashCashService, NetworkLoad,
    NetworkLoadSnapshot,
};

use crate::container::NodeConfig;
use crate::errors::NodeError;
use crate::handlers::{ConfidentialMessageService, NetworkLoadService};
use crate::network::{Node, NodeServices, NodeSettings, TrafficMetrics};

/// Upper bound on waiting for background tasks at shutdown.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The main runtime orchestrating transports, nodes and background services.
pub struct NodeRuntime {
    config: NodeConfig,
    identity: Arc<Ed25519KeyPair>,
    transports: TransportRegistry,
    store: Arc<DataStore>,
    inventory: Arc<InventoryService<DataStore>>,
    persistence: FilePersistence,
    nodes: BTreeMap<TransportType, Arc<Node>>,
    confidential: Arc<ConfidentialMessageService>,
    load_service: Arc<NetworkLoadService>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeRuntime {
    /// Build every component. Nothing touches the network until [`start`].
    ///
    /// ## Initialization Order
    ///
    /// 1. Transports from config
    /// 2. Data store, restored from the last snapshot
    /// 3. Inventory, authorization and load snapshot
    /// 4. One node per transport, sharing the above
    /// 5. Confidential messaging and the load service on top of the nodes
    ///
    /// [`start`]: NodeRuntime::start
    pub fn new(config: NodeConfig, identity: Ed25519KeyPair) -> Result<Self, NodeError> {
        config.validate()?;
        info!(node_id = %config.network.node_id, "Creating veilnet node runtime");

        let transports = TransportRegistry::from_config(&config.transport, &config.network.transports);

        let store = Arc::new(DataStore::new(
            StoreConfig::default(),
            Arc::new(SystemTimeSource::new()),
        ));
        let persistence = FilePersistence::in_dir(&config.store.data_dir);
        match store.load_from(&persistence) {
            Ok(restored) => info!(restored, "[node] Data store restored"),
            Err(e) => warn!(error = %e, "[node] Starting with an empty data store"),
        }

        let inventory = Arc::new(InventoryService::new(
            Arc::clone(&store),
            config.inventory.clone(),
        ));
        let auth: Arc<dyn AuthorizationService> =
            Arc::new(HashCashService::new(config.authorization.enabled));
        let loads = Arc::new(NetworkLoadSnapshot::new(NetworkLoad::new(
            NetworkLoad::INITIAL.load,
            config.authorization.difficulty_adjustment_factor,
        )));
        let metrics = Arc::new(TrafficMetrics::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let services = NodeServices {
            store: Arc::clone(&store),
            inventory: Arc::clone(&inventory),
            auth,
            loads: Arc::clone(&loads),
            metrics: Arc::clone(&metrics),
            shutdown: shutdown_rx.clone(),
        };
        let settings = NodeSettings::from_config(&config);
        let supported = transports.supported();
        let mut nodes = BTreeMap::new();
        for transport in &config.network.transports {
            let Some(service) = transports.get(*transport) else {
                continue;
            };
            let node = Node::new(service, supported.clone(), services.clone(), settings.clone());
            nodes.insert(*transport, node);
        }

        let identity = Arc::new(identity);
        let confidential = Arc::new(ConfidentialMessageService::new(
            Arc::clone(&identity),
            nodes.clone(),
            Arc::clone(&store),
        ));
        for node in nodes.values() {
            node.add_listener(confidential.clone());
        }

        let load_service = Arc::new(NetworkLoadService::new(
            loads,
            metrics,
            Arc::clone(&store),
            nodes.values().cloned().collect(),
            config.authorization.difficulty_adjustment_factor,
        ));

        Ok(Self {
            config,
            identity,
            transports,
            store,
            inventory,
            persistence,
            nodes,
            confidential,
            load_service,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Bring the node online.
    ///
    /// ## Startup Sequence
    ///
    /// 1. Initialize transports; a failed transport is skipped
    /// 2. Start listening on every initialized transport
    /// 3. Start the sweeper, load service and mailbox listener
    /// 4. Dial the seeds and reconcile with them
    pub async fn start(&self) -> Result<(), NodeError> {
        info!("===========================================");
        info!("  Veilnet Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let mut started = 0;
        for (transport, result) in self.transports.initialize_all().await {
            if let Err(e) = result {
                error!(%transport, error = %e, "[node] Transport failed to initialize");
                continue;
            }
            let Some(node) = self.nodes.get(&transport) else {
                continue;
            };
            let port = self.config.network.port(transport);
            match node.start(port, &self.config.network.node_id).await {
                Ok(_) => started += 1,
                Err(e) => error!(%transport, error = %e, "[node] Node failed to start"),
            }
        }
        if started == 0 {
            return Err(NodeError::NoRoute("no transport could be started".to_string()));
        }

        {
            let mut tasks = self.tasks.lock();
            tasks.push(spawn_sweeper(
                Arc::clone(&self.store),
                self.config.store.sweep_interval,
                self.shutdown_rx.clone(),
            ));
            tasks.push(Arc::clone(&self.load_service).spawn(
                self.config.authorization.network_load_interval,
                self.shutdown_rx.clone(),
            ));
            tasks.push(
                self.confidential
                    .spawn_mailbox_listener(self.shutdown_rx.clone()),
            );
        }

        self.connect_seeds().await;
        let reports = self.reconcile(&CancelToken::never()).await;
        let synced = reports.iter().filter(|r| r.is_ok()).count();
        info!(peers = reports.len(), synced, "[node] Initial reconciliation done");

        info!(
            key_id = %self.confidential.key_id(),
            transports = started,
            data_dir = %self.config.store.data_dir.display(),
            "All transports running"
        );
        Ok(())
    }

    async fn connect_seeds(&self) {
        for seed in &self.config.network.seed_addresses {
            let Some(node) = self.nodes.get(&seed.transport_type()) else {
                warn!(%seed, "[node] No node for seed transport");
                continue;
            };
            if node.address().as_ref() == Some(seed) {
                continue;
            }
            match node.connect(seed).await {
                Ok(_) => info!(%seed, "[node] Connected to seed"),
                Err(e) => warn!(%seed, error = %e, "[node] Seed unreachable"),
            }
        }
    }

    /// Pull missing entries from every connected peer.
    pub async fn reconcile(
        &self,
        cancel: &CancelToken,
    ) -> Vec<Result<ReconcileReport, InventoryError>> {
        let peers: Vec<Arc<dyn InventoryPeer>> = self
            .nodes
            .values()
            .flat_map(|node| node.inventory_peers())
            .collect();
        if peers.is_empty() {
            return Vec::new();
        }
        self.inventory.reconcile_all(&peers, cancel).await
    }

    /// Apply a locally authored request and flood it to every connected peer.
    ///
    /// Requests the store does not keep are not forwarded.
    pub async fn publish(&self, request: DataRequest) -> Result<StorageOutcome, NodeError> {
        let outcome = self.store.apply(request.clone())?;
        if outcome.is_stored() {
            let mut peers = 0;
            for node in self.nodes.values() {
                peers += node
                    .broadcast(EnvelopePayloadMessage::DataRequest(request.clone()))
                    .await;
            }
            debug!(kind = %request.kind(), peers, "[node] Published data request");
        }
        Ok(outcome)
    }

    /// Our addresses on every listening transport, plus our public key.
    pub fn network_id(&self) -> NetworkId {
        let addresses = self
            .nodes
            .iter()
            .filter_map(|(transport, node)| node.address().map(|a| (*transport, a)))
            .collect();
        NetworkId::new(addresses, *self.identity.public_key().as_bytes())
    }

    pub fn node(&self, transport: TransportType) -> Option<&Arc<Node>> {
        self.nodes.get(&transport)
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn confidential(&self) -> &Arc<ConfidentialMessageService> {
        &self.confidential
    }

    pub fn load_service(&self) -> &Arc<NetworkLoadService> {
        &self.load_service
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Stop the node gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Signal shutdown to every loop
    /// 2. Close connections with a `Shutdown` notice
    /// 3. Tear down transports
    /// 4. Persist the store
    /// 5. Wait for background tasks
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        let _ = self.shutdown_tx.send(true);

        for node in self.nodes.values() {
            node.shutdown().await;
        }
        self.transports.shutdown_all().await;

        if self.config.store.persist_on_shutdown {
            match self.store.save_to(&self.persistence) {
                Ok(()) => info!(entries = self.store.counts().total(), "[node] Data store saved"),
                Err(e) => error!(error = %e, "[node] Failed to save data store"),
            }
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await.is_err() {
                warn!("[node] Background task did not stop in time");
            }
        }
        info!("Shutdown complete");
    }
}
