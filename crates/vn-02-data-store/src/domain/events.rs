//! Change notifications broadcast by the store.

use crate::domain::keys::StorageKey;
use crate::domain::requests::{DataRequest, EntryKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A new or newer entry was stored.
    Added { kind: EntryKind, key: StorageKey, request: DataRequest },
    /// A tombstone replaced (or pre-empted) an entry.
    Removed { kind: EntryKind, key: StorageKey },
    /// The TTL sweep retired an entry.
    Expired { kind: EntryKind, key: StorageKey },
    /// The per-type map bound pushed an entry out.
    Evicted { kind: EntryKind, key: StorageKey },
}

impl StoreEvent {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Added { kind, .. }
            | Self::Removed { kind, .. }
            | Self::Expired { kind, .. }
            | Self::Evicted { kind, .. } => *kind,
        }
    }

    pub fn key(&self) -> StorageKey {
        match self {
            Self::Added { key, .. }
            | Self::Removed { key, .. }
            | Self::Expired { key, .. }
            | Self::Evicted { key, .. } => *key,
        }
    }
}
