//! The set of transports a node runs.
//!
//! Owned by the node and passed where needed; there is no process-wide
//! transport instance.

use crate::adapters::clear::ClearTransport;
use crate::adapters::i2p::I2pTransport;
use crate::adapters::tor::TorTransport;
use crate::domain::cancel::CancelToken;
use crate::domain::config::TransportConfig;
use crate::domain::errors::TransportError;
use crate::ports::inbound::TransportService;
use futures::future::join_all;
use shared_types::{Address, TransportType};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Transports keyed by type.
#[derive(Clone)]
pub struct TransportRegistry {
    services: BTreeMap<TransportType, Arc<dyn TransportService>>,
    shutdown_timeout: Duration,
}

impl TransportRegistry {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            services: BTreeMap::new(),
            shutdown_timeout,
        }
    }

    /// Build the stock adapter for every requested type.
    pub fn from_config(config: &TransportConfig, enabled: &[TransportType]) -> Self {
        let mut registry = Self::new(config.shutdown_timeout);
        for transport in enabled {
            let service: Arc<dyn TransportService> = match transport {
                TransportType::Clear => Arc::new(ClearTransport::new(config.clear.clone())),
                TransportType::Tor => Arc::new(TorTransport::new(config.tor.clone())),
                TransportType::I2p => Arc::new(I2pTransport::new(config.i2p.clone())),
            };
            registry.register(service);
        }
        registry
    }

    /// Add or replace the transport for its type.
    pub fn register(&mut self, service: Arc<dyn TransportService>) {
        self.services.insert(service.transport_type(), service);
    }

    pub fn get(&self, transport: TransportType) -> Option<Arc<dyn TransportService>> {
        self.services.get(&transport).cloned()
    }

    pub fn supported(&self) -> Vec<TransportType> {
        self.services.keys().copied().collect()
    }

    /// The transport able to reach `address`.
    pub fn for_address(&self, address: &Address) -> Result<Arc<dyn TransportService>, TransportError> {
        let transport = address.transport_type();
        self.get(transport)
            .ok_or(TransportError::NotInitialized(transport))
    }

    /// Initialize every transport concurrently.
    ///
    /// A transport that fails stays registered but unusable; the results say
    /// which ones came up.
    pub async fn initialize_all(&self) -> Vec<(TransportType, Result<bool, TransportError>)> {
        let futures = self.services.iter().map(|(transport, service)| {
            let service = Arc::clone(service);
            let transport = *transport;
            async move { (transport, service.initialize().await) }
        });
        let results = join_all(futures).await;
        for (transport, result) in &results {
            match result {
                Ok(_) => info!(%transport, "[vn-01] transport ready"),
                Err(e) => warn!(%transport, error = %e, "[vn-01] transport failed to initialize"),
            }
        }
        results
    }

    /// Connect to `address` with the matching transport.
    pub async fn connect(
        &self,
        address: &Address,
        cancel: &CancelToken,
    ) -> Result<TcpStream, TransportError> {
        self.for_address(address)?.get_socket(address, cancel).await
    }

    /// Shut every transport down, each bounded by the shutdown timeout.
    pub async fn shutdown_all(&self) {
        let timeout = self.shutdown_timeout;
        let futures = self.services.iter().map(|(transport, service)| {
            let service = Arc::clone(service);
            let transport = *transport;
            async move {
                match tokio::time::timeout(timeout, service.shutdown()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(%transport, error = %e, "[vn-01] transport shutdown failed"),
                    Err(_) => warn!(
                        %transport,
                        timeout_ms = timeout.as_millis() as u64,
                        "[vn-01] transport shutdown timed out"
                    ),
                }
            }
        });
        join_all(futures).await;
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("transports", &self.supported())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}
