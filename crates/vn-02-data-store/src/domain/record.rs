//! What the store keeps under a key.
//!
//! ```text
//!   add ──> Live ──remove──> Removed ──ttl──> (gone)
//!            │
//!            └──ttl──> Expired ──ttl──> (gone)
//! ```
//!
//! `Removed` and `Expired` remember the last sequence number so a stale
//! add still in flight cannot bring the entry back.

use crate::domain::requests::{DataRequest, EntryKind, RemoveRequest};
use serde::{Deserialize, Serialize};
use shared_crypto::Ed25519PublicKey;
use shared_types::{MetaData, Timestamp};

/// Who may remove an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub owner: Ed25519PublicKey,
    /// Mailbox receivers may remove messages addressed to them.
    pub receiver: Option<Ed25519PublicKey>,
}

impl Authority {
    pub fn permits(&self, signer: &Ed25519PublicKey) -> bool {
        self.owner == *signer || self.receiver.as_ref() == Some(signer)
    }

    /// Authority implied by an add request. `None` for append-only content.
    pub fn of(request: &DataRequest) -> Option<Self> {
        match request {
            DataRequest::AddAuthenticated(entry) => Some(Self {
                owner: entry.owner,
                receiver: None,
            }),
            DataRequest::AddMailbox(entry) => Some(Self {
                owner: *entry.sender(),
                receiver: Some(*entry.receiver()),
            }),
            DataRequest::RemoveAuthenticated(remove) | DataRequest::RemoveMailbox(remove) => {
                Some(Self {
                    owner: remove.signer,
                    receiver: None,
                })
            }
            DataRequest::AddAppendOnly(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// A stored add request.
    Live(DataRequest),
    /// Tombstone. `metadata` is the removed entry's, or the request's if the
    /// key was unknown.
    Removed {
        request: RemoveRequest,
        authority: Authority,
        metadata: MetaData,
    },
    /// Expiry marker left behind by the sweep.
    Expired {
        sequence_number: i32,
        authority: Authority,
        metadata: MetaData,
        expired_at: Timestamp,
    },
}

/// A record plus when this node stored it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub record: Record,
    pub inserted_at: Timestamp,
}

impl Slot {
    pub fn new(record: Record, inserted_at: Timestamp) -> Self {
        Self {
            record,
            inserted_at,
        }
    }

    pub fn sequence_number(&self) -> i32 {
        match &self.record {
            Record::Live(request) => request.sequence_number(),
            Record::Removed { request, .. } => request.sequence_number,
            Record::Expired {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    pub fn metadata(&self) -> &MetaData {
        match &self.record {
            Record::Live(request) => request.metadata(),
            Record::Removed { metadata, .. } | Record::Expired { metadata, .. } => metadata,
        }
    }

    pub fn authority(&self) -> Option<Authority> {
        match &self.record {
            Record::Live(request) => Authority::of(request),
            Record::Removed { authority, .. } | Record::Expired { authority, .. } => {
                Some(*authority)
            }
        }
    }

    /// Instant the record stops counting.
    ///
    /// Lifetimes start at the request's creation time, capped at local
    /// receipt so a future-dated request cannot extend its own life.
    pub fn expires_at(&self) -> Timestamp {
        match &self.record {
            Record::Live(request) => {
                let start = request.created().min(self.inserted_at);
                request.metadata().expires_at(start)
            }
            Record::Removed {
                request, metadata, ..
            } => metadata.expires_at(request.created.min(self.inserted_at)),
            Record::Expired {
                metadata,
                expired_at,
                ..
            } => metadata.expires_at(*expired_at),
        }
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at() <= now
    }

    /// The stored add, if live at `now`.
    pub fn live_at(&self, now: Timestamp) -> Option<&DataRequest> {
        match &self.record {
            Record::Live(request) if !self.is_expired_at(now) => Some(request),
            _ => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.record, Record::Removed { .. })
    }

    /// The record as a wire request: the add, or the remove for a tombstone.
    pub fn as_request(&self, kind: EntryKind) -> Option<DataRequest> {
        match (&self.record, kind) {
            (Record::Live(request), _) => Some(request.clone()),
            (Record::Removed { request, .. }, EntryKind::Authenticated) => {
                Some(DataRequest::RemoveAuthenticated(request.clone()))
            }
            (Record::Removed { request, .. }, EntryKind::Mailbox) => {
                Some(DataRequest::RemoveMailbox(request.clone()))
            }
            _ => None,
        }
    }

    /// What a live record becomes once its TTL passes; `None` drops it.
    pub(crate) fn into_expired(self) -> Option<Slot> {
        let expired_at = self.expires_at();
        match self.record {
            Record::Live(request) => {
                let authority = Authority::of(&request)?;
                Some(Slot {
                    record: Record::Expired {
                        sequence_number: request.sequence_number(),
                        authority,
                        metadata: request.metadata().clone(),
                        expired_at,
                    },
                    inserted_at: self.inserted_at,
                })
            }
            Record::Removed { .. } | Record::Expired { .. } => None,
        }
    }
}
