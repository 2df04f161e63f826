//! # Address & Transport-Type Model
//!
//! Canonical `host:port` representation used by every transport.
//!
//! The transport type is derived from the host:
//!
//! | Host | Transport |
//! |------|-----------|
//! | IP literal (v4 or v6) | `Clear` |
//! | ends with `.onion` | `Tor` |
//! | anything else | `I2p` |

use crate::errors::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Loopback literal substituted for `localhost`.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Suffix of Tor hidden-service hostnames.
pub const ONION_SUFFIX: &str = ".onion";

/// Length of a v3 onion service id (base32, without suffix).
pub const ONION_V3_ID_LEN: usize = 56;

// =============================================================================
// TRANSPORT TYPE
// =============================================================================

/// The network stack underlying an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportType {
    /// Plain TCP over the clear internet.
    Clear,
    /// Tor hidden services.
    Tor,
    /// I2P destinations.
    I2p,
}

impl TransportType {
    /// All transport types in a stable order.
    pub const ALL: [TransportType; 3] = [TransportType::Clear, TransportType::Tor, TransportType::I2p];

    /// Classify a host string.
    pub fn classify(host: &str) -> Self {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            TransportType::Clear
        } else if host.to_ascii_lowercase().ends_with(ONION_SUFFIX) {
            TransportType::Tor
        } else {
            TransportType::I2p
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportType::Clear => write!(f, "CLEAR"),
            TransportType::Tor => write!(f, "TOR"),
            TransportType::I2p => write!(f, "I2P"),
        }
    }
}

impl FromStr for TransportType {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" | "clearnet" | "clear_net" => Ok(TransportType::Clear),
            "tor" => Ok(TransportType::Tor),
            "i2p" => Ok(TransportType::I2p),
            other => Err(AddressError::UnknownTransport(other.to_string())),
        }
    }
}

// =============================================================================
// ADDRESS
// =============================================================================

/// A reachable `host:port` endpoint.
///
/// The host is never the literal `localhost`; it is replaced by the loopback
/// literal at construction so that equal endpoints compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawAddress", into = "RawAddress")]
pub struct Address {
    host: String,
    port: u16,
}

#[derive(Serialize, Deserialize)]
struct RawAddress {
    host: String,
    port: u16,
}

impl From<RawAddress> for Address {
    fn from(raw: RawAddress) -> Self {
        Address::new(raw.host, raw.port)
    }
}

impl From<Address> for RawAddress {
    fn from(address: Address) -> Self {
        RawAddress {
            host: address.host,
            port: address.port,
        }
    }
}

impl Address {
    /// Create an address, normalizing `localhost` to the loopback literal.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let host = if host.trim().eq_ignore_ascii_case("localhost") {
            LOOPBACK_HOST.to_string()
        } else {
            host.trim().to_string()
        };
        Self { host, port }
    }

    /// Loopback address on the given port.
    pub fn localhost(port: u16) -> Self {
        Self::new(LOOPBACK_HOST, port)
    }

    /// Host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Derived transport type.
    pub fn transport_type(&self) -> TransportType {
        TransportType::classify(&self.host)
    }

    /// True for IP-literal hosts.
    pub fn is_clear_net(&self) -> bool {
        self.transport_type() == TransportType::Clear
    }

    /// True for `.onion` hosts.
    pub fn is_tor(&self) -> bool {
        self.transport_type() == TransportType::Tor
    }

    /// True for everything else.
    pub fn is_i2p(&self) -> bool {
        self.transport_type() == TransportType::I2p
    }

    /// True if the host is a well-formed v3 onion name (56 base32 chars).
    pub fn is_valid_onion_v3(&self) -> bool {
        is_valid_onion_v3(&self.host)
    }

    /// Socket address for clear-net hosts, `None` for overlay hosts.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let bare = self.host.trim_start_matches('[').trim_end_matches(']');
        let ip: IpAddr = bare.parse().ok()?;
        Some(SocketAddr::new(ip, self.port))
    }

    /// Full textual form, `host:port`.
    pub fn full_address(&self) -> String {
        self.to_string()
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            // [v6]:port
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| AddressError::InvalidHost(s.to_string()))?;
            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
            (host, port)
        } else {
            s.rsplit_once(':')
                .ok_or_else(|| AddressError::MissingPort(s.to_string()))?
        };

        if host.is_empty() {
            return Err(AddressError::InvalidHost(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;

        Ok(Address::new(host, port))
    }
}

/// Check a host against the v3 onion format.
pub fn is_valid_onion_v3(host: &str) -> bool {
    let lower = host.to_ascii_lowercase();
    match lower.strip_suffix(ONION_SUFFIX) {
        Some(id) => {
            id.len() == ONION_V3_ID_LEN
                && id.bytes().all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b))
        }
        None => false,
    }
}
