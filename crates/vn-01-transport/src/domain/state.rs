//! Transport lifecycle state and server socket handle.

use parking_lot::RwLock;
use shared_types::Address;
use std::fmt;
use tokio::net::TcpListener;

/// Lifecycle of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Initializing,
    Initialized,
    Stopping,
    Terminated,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Initializing => "INITIALIZING",
            Self::Initialized => "INITIALIZED",
            Self::Stopping => "STOPPING",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Shared, lock-protected lifecycle state.
#[derive(Debug)]
pub struct StateCell(RwLock<TransportState>);

impl StateCell {
    pub fn new() -> Self {
        Self(RwLock::new(TransportState::New))
    }

    pub fn get(&self) -> TransportState {
        *self.0.read()
    }

    pub fn set(&self, state: TransportState) {
        *self.0.write() = state;
    }

    /// Move to `to` only if currently in `from`. Returns whether it moved.
    pub fn transition(&self, from: TransportState, to: TransportState) -> bool {
        let mut state = self.0.write();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.get() == TransportState::Initialized
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound inbound endpoint and the address peers should use to reach it.
///
/// For Tor and I2P the listener is a local loopback socket fed by the
/// hidden service or SAM forward; `address` is the overlay address.
#[derive(Debug)]
pub struct ServerSocket {
    pub listener: TcpListener,
    pub address: Address,
    pub server_id: String,
}
