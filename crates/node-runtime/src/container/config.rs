//! # Node Configuration
//!
//! Unified configuration for every subsystem. Loaded from an optional TOML
//! file whose fields all fall back to defaults, then overridden from the
//! environment.
//!
//! ```toml
//! [network]
//! node_id = "alice"
//! transports = ["clear", "tor"]
//! clear_port = 8000
//! seed_addresses = ["127.0.0.1:8001"]
//!
//! [tor]
//! control_port = 9051
//! socks_port = 9050
//!
//! [store]
//! data_dir = "./data"
//! sweep_interval_secs = 60
//!
//! [inventory]
//! max_size_kb = 2000
//!
//! [authorization]
//! enabled = true
//! ```

use serde::Deserialize;
use shared_types::{Address, TransportType};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use vn_01_transport::TransportConfig;
use vn_03_inventory::InventoryConfig;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub transport: TransportConfig,
    pub store: StoreSettings,
    pub inventory: InventoryConfig,
    pub authorization: AuthorizationConfig,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("No transport enabled")]
    NoTransports,
}

impl ConfigError {
    fn invalid(key: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Which transports run and where they listen.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub node_id: String,
    pub transports: Vec<TransportType>,
    /// Listening port per transport; 0 picks a free port.
    pub clear_port: u16,
    pub tor_port: u16,
    pub i2p_port: u16,
    /// Dialed at startup and reconciled with.
    pub seed_addresses: Vec<Address>,
    pub handshake_timeout: Duration,
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_id: "default".to_string(),
            transports: vec![TransportType::Clear],
            clear_port: 8000,
            tor_port: 1000,
            i2p_port: 5000,
            seed_addresses: Vec::new(),
            handshake_timeout: Duration::from_secs(120),
            max_connections: 100,
        }
    }
}

impl NetworkConfig {
    pub fn port(&self, transport: TransportType) -> u16 {
        match transport {
            TransportType::Clear => self.clear_port,
            TransportType::Tor => self.tor_port,
            TransportType::I2p => self.i2p_port,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub sweep_interval: Duration,
    pub data_dir: PathBuf,
    pub persist_on_shutdown: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            data_dir: PathBuf::from("./data"),
            persist_on_shutdown: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    /// With work disabled only message counters are checked.
    pub enabled: bool,
    pub network_load_interval: Duration,
    pub difficulty_adjustment_factor: f64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            network_load_interval: Duration::from_secs(180),
            difficulty_adjustment_factor: 1.0,
        }
    }
}

impl NodeConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        file.apply(&mut config)?;
        Ok(config)
    }

    /// Apply `VN_*` overrides read through `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `VN_NODE_ID` | `network.node_id` |
    /// | `VN_TRANSPORTS` | `network.transports` (comma separated) |
    /// | `VN_CLEAR_PORT`, `VN_TOR_PORT`, `VN_I2P_PORT` | listening ports |
    /// | `VN_SEEDS` | `network.seed_addresses` (comma separated) |
    /// | `VN_TOR_CONTROL_PORT`, `VN_TOR_SOCKS_PORT` | Tor daemon |
    /// | `VN_I2P_SAM_PORT` | I2P router |
    /// | `VN_DATA_DIR` | `store.data_dir` |
    /// | `VN_POW_ENABLED` | `authorization.enabled` |
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(node_id) = lookup("VN_NODE_ID") {
            self.network.node_id = node_id;
        }
        if let Some(list) = lookup("VN_TRANSPORTS") {
            self.network.transports = parse_list(&list, "VN_TRANSPORTS")?;
        }
        if let Some(list) = lookup("VN_SEEDS") {
            self.network.seed_addresses = parse_list(&list, "VN_SEEDS")?;
        }
        let ports: [(&str, &mut u16); 6] = [
            ("VN_CLEAR_PORT", &mut self.network.clear_port),
            ("VN_TOR_PORT", &mut self.network.tor_port),
            ("VN_I2P_PORT", &mut self.network.i2p_port),
            ("VN_TOR_CONTROL_PORT", &mut self.transport.tor.control_port),
            ("VN_TOR_SOCKS_PORT", &mut self.transport.tor.socks_port),
            ("VN_I2P_SAM_PORT", &mut self.transport.i2p.sam_port),
        ];
        for (key, field) in ports {
            if let Some(value) = lookup(key) {
                *field = parse_value(&value, key)?;
            }
        }
        if let Some(dir) = lookup("VN_DATA_DIR") {
            self.store.data_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = lookup("VN_POW_ENABLED") {
            self.authorization.enabled = parse_value(&enabled, "VN_POW_ENABLED")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.transports.is_empty() {
            return Err(ConfigError::NoTransports);
        }
        if self.network.node_id.trim().is_empty() {
            return Err(ConfigError::invalid("network.node_id", "must not be empty"));
        }
        if self.inventory.max_peers == 0 {
            return Err(ConfigError::invalid("inventory.max_peers", "must be positive"));
        }
        if self.store.sweep_interval.is_zero() {
            return Err(ConfigError::invalid("store.sweep_interval_secs", "must be positive"));
        }
        let factor = self.authorization.difficulty_adjustment_factor;
        if !(0.0..=vn_04_envelope::NetworkLoad::MAX_DIFFICULTY_ADJUSTMENT).contains(&factor) {
            return Err(ConfigError::invalid(
                "authorization.difficulty_adjustment_factor",
                format!("{factor} out of range"),
            ));
        }
        Ok(())
    }

    /// Loopback-only, short timeouts, no proof-of-work.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(data_dir: &Path) -> Self {
        Self {
            network: NetworkConfig {
                node_id: "test".to_string(),
                clear_port: 0,
                handshake_timeout: Duration::from_secs(5),
                ..NetworkConfig::default()
            },
            transport: TransportConfig {
                clear: vn_01_transport::ClearConfig::for_testing(),
                ..TransportConfig::default()
            },
            store: StoreSettings {
                data_dir: data_dir.to_path_buf(),
                ..StoreSettings::default()
            },
            inventory: InventoryConfig::for_testing(),
            authorization: AuthorizationConfig {
                enabled: false,
                ..AuthorizationConfig::default()
            },
        }
    }
}

fn parse_value<T>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| ConfigError::invalid(key, e))
}

fn parse_list<T>(value: &str, key: &str) -> Result<Vec<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(item, key))
        .collect()
}

// =============================================================================
// FILE FORMAT
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    network: NetworkFile,
    #[serde(default)]
    clear: ClearFile,
    #[serde(default)]
    tor: TorFile,
    #[serde(default)]
    i2p: I2pFile,
    #[serde(default)]
    store: StoreFile,
    #[serde(default)]
    inventory: InventoryFile,
    #[serde(default)]
    authorization: AuthorizationFile,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkFile {
    node_id: Option<String>,
    transports: Option<Vec<String>>,
    clear_port: Option<u16>,
    tor_port: Option<u16>,
    i2p_port: Option<u16>,
    seed_addresses: Option<Vec<String>>,
    handshake_timeout_secs: Option<u64>,
    max_connections: Option<usize>,
    shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ClearFile {
    bind_host: Option<String>,
    advertised_host: Option<String>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TorFile {
    control_host: Option<String>,
    control_port: Option<u16>,
    control_password: Option<String>,
    socks_host: Option<String>,
    socks_port: Option<u16>,
    connect_timeout_secs: Option<u64>,
    publish_timeout_secs: Option<u64>,
    key_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct I2pFile {
    sam_host: Option<String>,
    sam_port: Option<u16>,
    connect_timeout_secs: Option<u64>,
    router_startup_timeout_secs: Option<u64>,
    session_timeout_secs: Option<u64>,
    key_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct StoreFile {
    sweep_interval_secs: Option<u64>,
    data_dir: Option<PathBuf>,
    persist_on_shutdown: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryFile {
    max_size_kb: Option<usize>,
    request_timeout_secs: Option<u64>,
    max_peers: Option<usize>,
    max_rounds: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorizationFile {
    enabled: Option<bool>,
    network_load_interval_secs: Option<u64>,
    difficulty_adjustment_factor: Option<f64>,
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_secs(field: &mut Duration, value: Option<u64>) {
    set(field, value.map(Duration::from_secs));
}

impl ConfigFile {
    fn apply(self, config: &mut NodeConfig) -> Result<(), ConfigError> {
        let network = self.network;
        let target = &mut config.network;
        set(&mut target.node_id, network.node_id);
        if let Some(names) = network.transports {
            target.transports = names
                .iter()
                .map(|name| parse_value(name, "network.transports"))
                .collect::<Result<_, _>>()?;
        }
        set(&mut target.clear_port, network.clear_port);
        set(&mut target.tor_port, network.tor_port);
        set(&mut target.i2p_port, network.i2p_port);
        if let Some(seeds) = network.seed_addresses {
            target.seed_addresses = seeds
                .iter()
                .map(|seed| parse_value(seed, "network.seed_addresses"))
                .collect::<Result<_, _>>()?;
        }
        set_secs(&mut target.handshake_timeout, network.handshake_timeout_secs);
        set(&mut target.max_connections, network.max_connections);
        set_secs(&mut config.transport.shutdown_timeout, network.shutdown_timeout_secs);

        let clear = &mut config.transport.clear;
        set(&mut clear.bind_host, self.clear.bind_host);
        set(&mut clear.advertised_host, self.clear.advertised_host);
        set_secs(&mut clear.connect_timeout, self.clear.connect_timeout_secs);

        let tor = &mut config.transport.tor;
        set(&mut tor.control_host, self.tor.control_host);
        set(&mut tor.control_port, self.tor.control_port);
        if self.tor.control_password.is_some() {
            tor.control_password = self.tor.control_password;
        }
        set(&mut tor.socks_host, self.tor.socks_host);
        set(&mut tor.socks_port, self.tor.socks_port);
        set_secs(&mut tor.connect_timeout, self.tor.connect_timeout_secs);
        set_secs(&mut tor.publish_timeout, self.tor.publish_timeout_secs);
        if self.tor.key_dir.is_some() {
            tor.key_dir = self.tor.key_dir;
        }

        let i2p = &mut config.transport.i2p;
        set(&mut i2p.sam_host, self.i2p.sam_host);
        set(&mut i2p.sam_port, self.i2p.sam_port);
        set_secs(&mut i2p.connect_timeout, self.i2p.connect_timeout_secs);
        set_secs(&mut i2p.router_startup_timeout, self.i2p.router_startup_timeout_secs);
        set_secs(&mut i2p.session_timeout, self.i2p.session_timeout_secs);
        if self.i2p.key_dir.is_some() {
            i2p.key_dir = self.i2p.key_dir;
        }

        let store = &mut config.store;
        set_secs(&mut store.sweep_interval, self.store.sweep_interval_secs);
        set(&mut store.data_dir, self.store.data_dir);
        set(&mut store.persist_on_shutdown, self.store.persist_on_shutdown);

        let inventory = &mut config.inventory;
        set(&mut inventory.max_size_kb, self.inventory.max_size_kb);
        set_secs(&mut inventory.request_timeout, self.inventory.request_timeout_secs);
        set(&mut inventory.max_peers, self.inventory.max_peers);
        set(&mut inventory.max_rounds, self.inventory.max_rounds);

        let authorization = &mut config.authorization;
        set(&mut authorization.enabled, self.authorization.enabled);
        set_secs(
            &mut authorization.network_load_interval,
            self.authorization.network_load_interval_secs,
        );
        set(
            &mut authorization.difficulty_adjustment_factor,
            self.authorization.difficulty_adjustment_factor,
        );
        Ok(())
    }
}
