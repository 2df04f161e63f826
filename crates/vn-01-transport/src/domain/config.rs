//! Transport configuration.
//!
//! Plain structs with production defaults; the node runtime fills them from
//! its TOML file. `for_testing` variants shorten every timeout.

use std::path::PathBuf;
use std::time::Duration;

/// Clear-net TCP.
#[derive(Debug, Clone)]
pub struct ClearConfig {
    /// Interface listeners bind to.
    pub bind_host: String,
    /// Host advertised in our own addresses.
    pub advertised_host: String,
    pub connect_timeout: Duration,
}

impl Default for ClearConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            advertised_host: "127.0.0.1".to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ClearConfig {
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }
}

/// Tor via an external daemon's control port and SOCKS proxy.
#[derive(Debug, Clone)]
pub struct TorConfig {
    pub control_host: String,
    pub control_port: u16,
    /// `HashedControlPassword` secret, if the daemon requires one.
    pub control_password: Option<String>,
    pub socks_host: String,
    pub socks_port: u16,
    /// Circuit building is slow; outbound connects get a generous bound.
    pub connect_timeout: Duration,
    /// How long to wait for a new hidden-service descriptor upload.
    pub publish_timeout: Duration,
    /// Where hidden-service private keys are kept per node id. In-memory only if `None`.
    pub key_dir: Option<PathBuf>,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            control_host: "127.0.0.1".to_string(),
            control_port: 9051,
            control_password: None,
            socks_host: "127.0.0.1".to_string(),
            socks_port: 9050,
            connect_timeout: Duration::from_secs(120),
            publish_timeout: Duration::from_secs(120),
            key_dir: None,
        }
    }
}

impl TorConfig {
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(control_port: u16, socks_port: u16) -> Self {
        Self {
            control_port,
            socks_port,
            connect_timeout: Duration::from_secs(2),
            publish_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }
}

/// I2P via a router's SAM v3 bridge.
#[derive(Debug, Clone)]
pub struct I2pConfig {
    pub sam_host: String,
    pub sam_port: u16,
    /// Outbound stream connect bound.
    pub connect_timeout: Duration,
    /// How long to wait for the router's SAM bridge to come up.
    pub router_startup_timeout: Duration,
    /// Tunnel building for a new session can take a while.
    pub session_timeout: Duration,
    pub key_dir: Option<PathBuf>,
}

impl Default for I2pConfig {
    fn default() -> Self {
        Self {
            sam_host: "127.0.0.1".to_string(),
            sam_port: 7656,
            connect_timeout: Duration::from_secs(120),
            router_startup_timeout: Duration::from_secs(180),
            session_timeout: Duration::from_secs(120),
            key_dir: None,
        }
    }
}

impl I2pConfig {
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(sam_port: u16) -> Self {
        Self {
            sam_port,
            connect_timeout: Duration::from_secs(2),
            router_startup_timeout: Duration::from_secs(2),
            session_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }
}

/// All transports plus registry-wide settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub clear: ClearConfig,
    pub tor: TorConfig,
    pub i2p: I2pConfig,
    /// Upper bound on each transport's shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            clear: ClearConfig::default(),
            tor: TorConfig::default(),
            i2p: I2pConfig::default(),
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}
