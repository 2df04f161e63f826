//! Clear-net TCP transport.

use crate::domain::cancel::{run_cancellable, CancelToken};
use crate::domain::config::ClearConfig;
use crate::domain::errors::TransportError;
use crate::domain::state::{ServerSocket, StateCell, TransportState};
use crate::ports::inbound::TransportService;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Address, TransportType};
use std::collections::HashMap;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// Plain TCP.
#[derive(Debug)]
pub struct ClearTransport {
    config: ClearConfig,
    state: StateCell,
    servers: RwLock<HashMap<String, Address>>,
}

impl ClearTransport {
    pub fn new(config: ClearConfig) -> Self {
        Self {
            config,
            state: StateCell::new(),
            servers: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_initialized(&self) -> Result<(), TransportError> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(TransportError::NotInitialized(TransportType::Clear))
        }
    }
}

#[async_trait]
impl TransportService for ClearTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Clear
    }

    fn state(&self) -> TransportState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<bool, TransportError> {
        match self.state.get() {
            TransportState::Initialized => Ok(true),
            TransportState::Stopping | TransportState::Terminated => {
                Err(TransportError::NotInitialized(TransportType::Clear))
            }
            TransportState::New | TransportState::Initializing => {
                self.state.set(TransportState::Initialized);
                info!("[vn-01] clear transport initialized");
                Ok(true)
            }
        }
    }

    async fn get_server_socket(
        &self,
        port: u16,
        server_id: &str,
    ) -> Result<ServerSocket, TransportError> {
        self.ensure_initialized()?;

        let listener = TcpListener::bind((self.config.bind_host.as_str(), port))
            .await
            .map_err(|e| TransportError::BindFailed {
                port,
                reason: e.to_string(),
            })?;
        let bound = listener.local_addr()?;
        let address = Address::new(self.config.advertised_host.clone(), bound.port());

        self.servers
            .write()
            .insert(server_id.to_string(), address.clone());
        info!(server_id, %address, "[vn-01] clear server socket bound");

        Ok(ServerSocket {
            listener,
            address,
            server_id: server_id.to_string(),
        })
    }

    async fn get_socket(
        &self,
        address: &Address,
        cancel: &CancelToken,
    ) -> Result<TcpStream, TransportError> {
        self.ensure_initialized()?;

        let target = address
            .to_socket_addr()
            .ok_or_else(|| TransportError::UnsupportedAddress {
                transport: TransportType::Clear,
                address: address.to_string(),
            })?;

        debug!(%address, "[vn-01] clear connect");
        let connect = async {
            let stream = TcpStream::connect(target)
                .await
                .map_err(|e| TransportError::connection_failed(address, e))?;
            stream.set_nodelay(true)?;
            Ok(stream)
        };
        run_cancellable("clear connect", connect, self.config.connect_timeout, cancel).await
    }

    fn get_server_address(&self, server_id: &str) -> Option<Address> {
        self.servers.read().get(server_id).cloned()
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        if self.state.get() == TransportState::Terminated {
            return Ok(());
        }
        self.state.set(TransportState::Stopping);
        self.servers.write().clear();
        self.state.set(TransportState::Terminated);
        info!("[vn-01] clear transport terminated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn initialized() -> ClearTransport {
        let transport = ClearTransport::new(ClearConfig::for_testing());
        assert!(transport.initialize().await.unwrap());
        transport
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let transport = initialized().await;
        assert!(transport.initialize().await.unwrap());
        assert_eq!(transport.state(), TransportState::Initialized);
    }

    #[tokio::test]
    async fn test_server_and_client_exchange_bytes() {
        let transport = initialized().await;
        let server = transport.get_server_socket(0, "default").await.unwrap();
        assert!(server.address.is_clear_net());
        assert_ne!(server.address.port(), 0);
        assert_eq!(
            transport.get_server_address("default"),
            Some(server.address.clone())
        );

        let accept = tokio::spawn(async move {
            let (mut inbound, _) = server.listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            inbound.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut outbound = transport
            .get_socket(&server_address(&transport), &CancelToken::never())
            .await
            .unwrap();
        outbound.write_all(b"hello").await.unwrap();

        assert_eq!(&accept.await.unwrap(), b"hello");
    }

    fn server_address(transport: &ClearTransport) -> Address {
        transport.get_server_address("default").unwrap()
    }

    #[tokio::test]
    async fn test_onion_address_is_unsupported() {
        let transport = initialized().await;
        let onion = Address::new(format!("{}.onion", "a".repeat(56)), 80);
        let result = transport.get_socket(&onion, &CancelToken::never()).await;
        assert!(matches!(
            result,
            Err(TransportError::UnsupportedAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_operations_fail_after_shutdown() {
        let transport = initialized().await;
        transport.get_server_socket(0, "default").await.unwrap();
        transport.shutdown().await.unwrap();

        assert_eq!(transport.state(), TransportState::Terminated);
        assert_eq!(transport.get_server_address("default"), None);
        assert!(matches!(
            transport.get_server_socket(0, "again").await,
            Err(TransportError::NotInitialized(TransportType::Clear))
        ));
        assert!(transport.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_server_id_has_no_address() {
        let transport = initialized().await;
        assert_eq!(transport.get_server_address("missing"), None);
    }
}
