//! I2P transport over a router's SAM bridge.
//!
//! Each server id owns a persistent streaming session whose destination is
//! its address host. Inbound streams are forwarded to a loopback listener.
//! Outbound streams use the most recently created session, or a transient
//! one created on first use when the node runs no I2P server.

mod sam;


use crate::adapters::keys::HiddenServiceKeyStore;
use crate::domain::cancel::{run_cancellable, CancelToken};
use crate::domain::config::I2pConfig;
use crate::domain::errors::TransportError;
use crate::domain::state::{ServerSocket, StateCell, TransportState};
use crate::ports::inbound::TransportService;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Address, TransportType};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const LOCAL_BIND_HOST: &str = "127.0.0.1";
const I2P_NAME_SUFFIX: &str = ".i2p";
const STARTUP_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// A live SAM session. Dropping `control` ends it.
#[derive(Debug)]
struct SamSession {
    id: String,
    _control: TcpStream,
}

#[derive(Debug, Default)]
struct Sessions {
    by_server: HashMap<String, SamSession>,
    latest: Option<String>,
    transient: Option<SamSession>,
    /// Open `STREAM FORWARD` sockets; forwarding stops when they close.
    forwards: Vec<TcpStream>,
}

impl Sessions {
    fn outbound_session_id(&self) -> Option<String> {
        self.latest
            .as_ref()
            .and_then(|server_id| self.by_server.get(server_id))
            .or(self.transient.as_ref())
            .map(|session| session.id.clone())
    }
}

/// I2P streaming via SAM v3.
#[derive(Debug)]
pub struct I2pTransport {
    config: I2pConfig,
    state: StateCell,
    init_lock: Mutex<()>,
    sessions: Mutex<Sessions>,
    keys: HiddenServiceKeyStore,
    servers: RwLock<HashMap<String, Address>>,
}

impl I2pTransport {
    pub fn new(config: I2pConfig) -> Self {
        let keys = HiddenServiceKeyStore::new(config.key_dir.clone(), "i2p");
        Self {
            config,
            state: StateCell::new(),
            init_lock: Mutex::new(()),
            sessions: Mutex::new(Sessions::default()),
            keys,
            servers: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_initialized(&self) -> Result<(), TransportError> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(TransportError::NotInitialized(TransportType::I2p))
        }
    }

    async fn hello(&self) -> Result<TcpStream, TransportError> {
        sam::hello(&self.config.sam_host, self.config.sam_port).await
    }

    /// Poll the bridge until it answers `HELLO` or the startup bound passes.
    async fn await_router(&self) -> Result<(), TransportError> {
        let poll = async {
            loop {
                match self.hello().await {
                    Ok(_) => return,
                    Err(e) => {
                        debug!(error = %e, "[vn-01] SAM bridge not ready");
                        tokio::time::sleep(STARTUP_RETRY_INTERVAL).await;
                    }
                }
            }
        };
        tokio::time::timeout(self.config.router_startup_timeout, poll)
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "waiting for I2P router".to_string(),
                after_ms: self.config.router_startup_timeout.as_millis() as u64,
            })
    }

    /// Load or create the destination keypair of `server_id`.
    async fn destination_keys(
        &self,
        control: &mut TcpStream,
        server_id: &str,
    ) -> Result<(String, String), TransportError> {
        if let Some(stored) = self.keys.load(server_id).await? {
            if let Some((public, private)) = stored.split_once(' ') {
                return Ok((public.to_string(), private.to_string()));
            }
            warn!(server_id, "[vn-01] ignoring malformed stored I2P keys");
        }
        let (public, private) = sam::generate_destination(control).await?;
        self.keys
            .store(server_id, &format!("{public} {private}"))
            .await?;
        Ok((public, private))
    }

    async fn open_session(
        &self,
        label: &str,
        destination: &str,
        mut control: TcpStream,
    ) -> Result<SamSession, TransportError> {
        let id = session_id(label);
        let create = sam::create_session(&mut control, &id, destination);
        run_cancellable(
            "I2P session create",
            create,
            self.config.session_timeout,
            &CancelToken::never(),
        )
        .await?;
        info!(session = %id, "[vn-01] I2P session created");
        Ok(SamSession {
            id,
            _control: control,
        })
    }
}

fn session_id(label: &str) -> String {
    let safe: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("vn-{safe}-{:08x}", rand::random::<u32>())
}

#[async_trait]
impl TransportService for I2pTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::I2p
    }

    fn state(&self) -> TransportState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<bool, TransportError> {
        let _guard = self.init_lock.lock().await;
        match self.state.get() {
            TransportState::Initialized => return Ok(true),
            TransportState::Stopping | TransportState::Terminated => {
                return Err(TransportError::NotInitialized(TransportType::I2p))
            }
            TransportState::New | TransportState::Initializing => {}
        }

        self.state.set(TransportState::Initializing);
        match self.await_router().await {
            Ok(()) => {
                self.state.set(TransportState::Initialized);
                info!("[vn-01] I2P transport initialized");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "[vn-01] I2P initialization failed");
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

        let mut sessions = self.sessions.lock().await;
        if !sessions.by_server.contains_key(server_id) {
            let mut control = self.hello().await?;
            let (public, private) = self.destination_keys(&mut control, server_id).await?;
            let session = self.open_session(server_id, &private, control).await?;
            sessions.by_server.insert(server_id.to_string(), session);
            self.servers
                .write()
                .insert(server_id.to_string(), Address::new(public, port));
        }
        sessions.latest = Some(server_id.to_string());

        let session_id = sessions
            .by_server
            .get(server_id)
            .map(|session| session.id.clone())
            .ok_or(TransportError::NotInitialized(TransportType::I2p))?;

        let listener = TcpListener::bind((LOCAL_BIND_HOST, 0))
            .await
            .map_err(|e| TransportError::BindFailed {
                port: 0,
                reason: e.to_string(),
            })?;
        let local_port = listener.local_addr()?.port();

        let mut forward = self.hello().await?;
        sam::stream_forward(&mut forward, &session_id, local_port).await?;
        sessions.forwards.push(forward);
        drop(sessions);

        let address = self
            .get_server_address(server_id)
            .ok_or(TransportError::NotInitialized(TransportType::I2p))?;
        info!(server_id, local_port, "[vn-01] I2P destination forwarding");

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
        if !address.is_i2p() {
            return Err(TransportError::UnsupportedAddress {
                transport: TransportType::I2p,
                address: address.to_string(),
            });
        }

        let session_id = {
            let mut sessions = self.sessions.lock().await;
            match sessions.outbound_session_id() {
                Some(id) => id,
                None => {
                    let control = self.hello().await?;
                    let session = self.open_session("transient", sam::TRANSIENT, control).await?;
                    let id = session.id.clone();
                    sessions.transient = Some(session);
                    id
                }
            }
        };

        let host = address.host().to_string();
        let connect = async {
            let mut stream = self.hello().await?;
            let destination = if host.ends_with(I2P_NAME_SUFFIX) {
                sam::naming_lookup(&mut stream, &host).await?
            } else {
                host.clone()
            };
            sam::stream_connect(&mut stream, &session_id, &destination).await?;
            Ok(stream)
        };
        debug!(%address, "[vn-01] i2p connect");
        run_cancellable("i2p connect", connect, self.config.connect_timeout, cancel).await
    }

    fn get_server_address(&self, server_id: &str) -> Option<Address> {
        self.servers.read().get(server_id).cloned()
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        if self.state.get() == TransportState::Terminated {
            return Ok(());
        }
        self.state.set(TransportState::Stopping);

        let closed = std::mem::take(&mut *self.sessions.lock().await);
        drop(closed);

        self.servers.write().clear();
        self.state.set(TransportState::Terminated);
        info!("[vn-01] I2P transport terminated");
        Ok(())
    }
}
