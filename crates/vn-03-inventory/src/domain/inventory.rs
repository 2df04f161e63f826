//! Inventory request and response shapes.

use crate::domain::filter::DataFilter;
use serde::{Deserialize, Serialize};
use vn_02_data_store::{DataRequest, StorageOutcome};

/// Entries a peer is missing, bounded by a byte budget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub entries: Vec<DataRequest>,
    /// More entries were missing than fit; ask again.
    pub max_size_reached: bool,
}

impl Inventory {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// "Here is what I have; send me what I lack."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRequest {
    pub filter: DataFilter,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub inventory: Inventory,
    pub request_nonce: u64,
}

/// What ingesting an inventory did to the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub stored: usize,
    pub duplicates: usize,
    pub stale: usize,
    pub rejected: usize,
}

impl IngestReport {
    pub(crate) fn record(&mut self, outcome: Option<StorageOutcome>) {
        match outcome {
            Some(StorageOutcome::Added | StorageOutcome::Removed) => self.stored += 1,
            Some(StorageOutcome::AlreadyReceived) => self.duplicates += 1,
            Some(StorageOutcome::RejectedStale { .. }) => self.stale += 1,
            None => self.rejected += 1,
        }
    }

    pub(crate) fn merge(&mut self, other: IngestReport) {
        self.stored += other.stored;
        self.duplicates += other.duplicates;
        self.stale += other.stale;
        self.rejected += other.rejected;
    }
}
