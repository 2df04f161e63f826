//! Transport errors.

use shared_types::TransportType;
use thiserror::Error;

/// Errors raised by any transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has not been initialized, or has been shut down.
    #[error("{0} transport is not initialized")]
    NotInitialized(TransportType),

    /// The address belongs to a different transport than the one asked.
    #[error("{transport} transport cannot reach {address}")]
    UnsupportedAddress {
        transport: TransportType,
        address: String,
    },

    /// Binding a local listener failed.
    #[error("failed to bind port {port}: {reason}")]
    BindFailed { port: u16, reason: String },

    /// Connecting to a peer, proxy, control port or bridge failed.
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// The operation did not finish within its timeout.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// The caller cancelled the operation.
    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    /// The Tor control port, SOCKS proxy or SAM bridge answered with an error.
    #[error("{transport} protocol error: {reason}")]
    Protocol {
        transport: TransportType,
        reason: String,
    },

    /// Local I/O failed (key files, sockets).
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub(crate) fn connection_failed(address: impl ToString, err: impl ToString) -> Self {
        Self::ConnectionFailed {
            address: address.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn protocol(transport: TransportType, reason: impl Into<String>) -> Self {
        Self::Protocol {
            transport,
            reason: reason.into(),
        }
    }

    /// True for failures a caller may retry later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}
