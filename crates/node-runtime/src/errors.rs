//! Node-level errors.

use crate::container::config::ConfigError;
use shared_crypto::CryptoError;
use shared_types::TransportType;
use thiserror::Error;
use vn_01_transport::TransportError;
use vn_02_data_store::StorageError;
use vn_04_envelope::{AuthorizationError, EnvelopeError};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: String, reason: String },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("connection {0} is closed")]
    ConnectionClosed(String),

    #[error("connection {0} ran out of message counters")]
    CounterExhausted(String),

    #[error("no route to {0}")]
    NoRoute(String),

    #[error("{peer} answered with {message}")]
    UnexpectedResponse { peer: String, message: &'static str },

    #[error("{0} node is not listening yet")]
    NotStarted(TransportType),

    #[error("too many connections ({0})")]
    TooManyConnections(usize),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    pub(crate) fn handshake(peer: impl ToString, reason: impl ToString) -> Self {
        NodeError::Handshake {
            peer: peer.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for NodeError {
    fn from(err: tokio::task::JoinError) -> Self {
        NodeError::Task(err.to_string())
    }
}
