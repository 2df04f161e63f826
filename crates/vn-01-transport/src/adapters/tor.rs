//! Tor transport over an external daemon.
//!
//! Inbound: each server id gets a v3 hidden service whose virtual port maps
//! to a loopback listener. The address is only handed out once Tor reports
//! the descriptor as uploaded. Outbound: SOCKS5 via the daemon's proxy.

mod control;
mod socks;

#[cfg(test)]
mod tests;

use crate::adapters::keys::HiddenServiceKeyStore;
use crate::domain::cancel::{run_cancellable, CancelToken};
use crate::domain::config::TorConfig;
use crate::domain::errors::TransportError;
use crate::domain::state::{ServerSocket, StateCell, TransportState};
use crate::ports::inbound::TransportService;
use async_trait::async_trait;
use control::TorControl;
use parking_lot::RwLock;
use shared_types::address::ONION_SUFFIX;
use shared_types::{Address, TransportType};
use std::collections::HashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const LOCAL_BIND_HOST: &str = "127.0.0.1";

/// Tor hidden services and SOCKS connections.
#[derive(Debug)]
pub struct TorTransport {
    config: TorConfig,
    state: StateCell,
    init_lock: Mutex<()>,
    control: Mutex<Option<TorControl>>,
    keys: HiddenServiceKeyStore,
    servers: RwLock<HashMap<String, Address>>,
    published: RwLock<Vec<String>>,
}

impl TorTransport {
    pub fn new(config: TorConfig) -> Self {
        let keys = HiddenServiceKeyStore::new(config.key_dir.clone(), "tor");
        Self {
            config,
            state: StateCell::new(),
            init_lock: Mutex::new(()),
            control: Mutex::new(None),
            keys,
            servers: RwLock::new(HashMap::new()),
            published: RwLock::new(Vec::new()),
        }
    }

    fn ensure_initialized(&self) -> Result<(), TransportError> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(TransportError::NotInitialized(TransportType::Tor))
        }
    }

    async fn open_control(&self) -> Result<TorControl, TransportError> {
        let connect = async {
            let mut control =
                TorControl::connect(&self.config.control_host, self.config.control_port).await?;
            control
                .authenticate(self.config.control_password.as_deref())
                .await?;
            let version = control.version().await?;
            control.set_events(&["HS_DESC"]).await?;
            Ok::<_, TransportError>((control, version))
        };

        let (control, version) = run_cancellable(
            "tor control handshake",
            connect,
            self.config.connect_timeout,
            &CancelToken::never(),
        )
        .await?;
        info!(%version, "[vn-01] connected to tor control port");
        Ok(control)
    }
}

#[async_trait]
impl TransportService for TorTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Tor
    }

    fn state(&self) -> TransportState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<bool, TransportError> {
        let _guard = self.init_lock.lock().await;
        match self.state.get() {
            TransportState::Initialized => return Ok(true),
            TransportState::Stopping | TransportState::Terminated => {
                return Err(TransportError::NotInitialized(TransportType::Tor))
            }
            TransportState::New | TransportState::Initializing => {}
        }

        self.state.set(TransportState::Initializing);
        match self.open_control().await {
            Ok(control) => {
                *self.control.lock().await = Some(control);
                self.state.set(TransportState::Initialized);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "[vn-01] tor initialization failed");
                self.state.set(TransportState::New);
                Err(e)
            }
        }
    }

    async fn get_server_socket(
        &self,
        port: u16,
        server_id: &str,
    ) -> Result<ServerSocket, TransportError> {
        self.ensure_initialized()?;

        let listener = TcpListener::bind((LOCAL_BIND_HOST, 0))
            .await
            .map_err(|e| TransportError::BindFailed {
                port: 0,
                reason: e.to_string(),
            })?;
        let local = listener.local_addr()?;
        let stored_key = self.keys.load(server_id).await?;

        let mut guard = self.control.lock().await;
        let control = guard
            .as_mut()
            .ok_or(TransportError::NotInitialized(TransportType::Tor))?;

        let added = control.add_onion(stored_key.as_deref(), port, local).await?;
        if let Some(private_key) = &added.private_key {
            self.keys.store(server_id, private_key).await?;
        }
        debug!(service_id = %added.service_id, "[vn-01] hidden service added, awaiting upload");

        if let Err(e) = control
            .wait_for_upload(&added.service_id, self.config.publish_timeout)
            .await
        {
            if let Err(del) = control.del_onion(&added.service_id).await {
                warn!(error = %del, "[vn-01] failed to remove unpublished hidden service");
            }
            return Err(e);
        }
        drop(guard);

        let address = Address::new(format!("{}{}", added.service_id, ONION_SUFFIX), port);
        self.servers
            .write()
            .insert(server_id.to_string(), address.clone());
        self.published.write().push(added.service_id);
        info!(server_id, %address, "[vn-01] hidden service published");

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
        if address.is_i2p() {
            return Err(TransportError::UnsupportedAddress {
                transport: TransportType::Tor,
                address: address.to_string(),
            });
        }

        let proxy = format!("{}:{}", self.config.socks_host, self.config.socks_port);
        debug!(%address, "[vn-01] tor connect");
        run_cancellable(
            "tor connect",
            socks::connect(&proxy, address.host(), address.port()),
            self.config.connect_timeout,
            cancel,
        )
        .await
    }

    fn get_server_address(&self, server_id: &str) -> Option<Address> {
        self.servers.read().get(server_id).cloned()
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        if self.state.get() == TransportState::Terminated {
            return Ok(());
        }
        self.state.set(TransportState::Stopping);

        let services: Vec<String> = std::mem::take(&mut *self.published.write());
        if let Some(mut control) = self.control.lock().await.take() {
            for service_id in services {
                if let Err(e) = control.del_onion(&service_id).await {
                    warn!(%service_id, error = %e, "[vn-01] DEL_ONION failed");
                }
            }
        }

        self.servers.write().clear();
        self.state.set(TransportState::Terminated);
        info!("[vn-01] tor transport terminated");
        Ok(())
    }
}
