//! Validation failures.
//!
//! Stale writes are not errors; they are reported as
//! [`StorageOutcome::RejectedStale`](crate::StorageOutcome::RejectedStale).

use crate::domain::keys::StorageKey;
use crate::domain::requests::EntryKind;
use shared_types::{MetaDataError, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Structurally invalid request; never reaches the sequence check.
    #[error("malformed {kind} request: {reason}")]
    Malformed { kind: EntryKind, reason: String },

    #[error("invalid metadata: {0}")]
    InvalidMetaData(#[from] MetaDataError),

    /// `created + ttl` already passed when the request arrived.
    #[error("{kind} request created at {created} has expired")]
    RequestExpired { kind: EntryKind, created: Timestamp },

    /// Append-only content does not hash to its declared key.
    #[error("content hash mismatch for {key}")]
    ContentHashMismatch { key: StorageKey },

    #[error("invalid signature on {kind} request {key}")]
    InvalidSignature { kind: EntryKind, key: StorageKey },

    /// Remove signed by someone other than the entry's owner (or receiver).
    #[error("{signer} is not allowed to remove {key}")]
    NotAuthorized { key: StorageKey, signer: String },

    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl StorageError {
    pub(crate) fn malformed(kind: EntryKind, reason: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}
