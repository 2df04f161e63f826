//! Reconciliation failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory request to {peer} timed out after {after_ms}ms")]
    Timeout { peer: String, after_ms: u64 },

    #[error("inventory request to {peer} cancelled")]
    Cancelled { peer: String },

    /// The peer sent a filter above the entry cap.
    #[error("filter with {len} entries exceeds the cap of {max}")]
    FilterTooLarge { len: usize, max: usize },

    /// Response does not answer the request that was sent.
    #[error("response nonce {got} does not match request {expected}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("peer {peer} failed: {reason}")]
    Peer { peer: String, reason: String },
}

impl InventoryError {
    pub fn peer(peer: impl Into<String>, reason: impl ToString) -> Self {
        Self::Peer {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }
}
