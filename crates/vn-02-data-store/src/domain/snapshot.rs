//! Read views of the store.

use crate::domain::keys::StorageKey;
use crate::domain::record::Slot;
use crate::domain::requests::EntryKind;
use serde::{Deserialize, Serialize};

/// One retained record as seen by filter and inventory builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub kind: EntryKind,
    pub key: StorageKey,
    /// `None` for append-only entries.
    pub sequence_number: Option<i32>,
    pub is_tombstone: bool,
    pub priority: i32,
}

/// Live entries per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub authenticated: usize,
    pub mailbox: usize,
    pub append_only: usize,
}

impl StoreCounts {
    pub fn total(&self) -> usize {
        self.authenticated + self.mailbox + self.append_only
    }

    pub(crate) fn bump(&mut self, kind: EntryKind) {
        match kind {
            EntryKind::Authenticated => self.authenticated += 1,
            EntryKind::Mailbox => self.mailbox += 1,
            EntryKind::AppendOnly => self.append_only += 1,
        }
    }
}

/// Everything needed to restore the store after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub authenticated: Vec<(StorageKey, Slot)>,
    pub mailbox: Vec<(StorageKey, Slot)>,
    pub append_only: Vec<(StorageKey, Slot)>,
}

impl StoreSnapshot {
    pub const VERSION: u32 = 1;

    pub fn slots(&self, kind: EntryKind) -> &[(StorageKey, Slot)] {
        match kind {
            EntryKind::Authenticated => &self.authenticated,
            EntryKind::Mailbox => &self.mailbox,
            EntryKind::AppendOnly => &self.append_only,
        }
    }

    pub(crate) fn slots_mut(&mut self, kind: EntryKind) -> &mut Vec<(StorageKey, Slot)> {
        match kind {
            EntryKind::Authenticated => &mut self.authenticated,
            EntryKind::Mailbox => &mut self.mailbox,
            EntryKind::AppendOnly => &mut self.append_only,
        }
    }

    pub fn len(&self) -> usize {
        self.authenticated.len() + self.mailbox.len() + self.append_only.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
