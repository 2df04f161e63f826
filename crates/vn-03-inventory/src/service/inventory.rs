//! Both sides of one reconciliation round.
//!
//! ```text
//!  requester                         responder
//!  build_filter() ── request ──────> handle_request()
//!                                      find_missing(filter)
//!                                      build_inventory (budgeted)
//!  ingest() <──────── response ──────
//! ```
//!
//! The filter only decides what to send. Everything received goes through
//! the store's normal validation.

use crate::domain::config::InventoryConfig;
use crate::domain::errors::InventoryError;
use crate::domain::filter::DataFilter;
use crate::domain::inventory::{IngestReport, Inventory, InventoryRequest, InventoryResponse};
use crate::ports::outbound::StoreView;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;
use vn_02_data_store::{EntryKind, SnapshotEntry};

pub struct InventoryService<S: StoreView + ?Sized> {
    pub(crate) store: Arc<S>,
    pub(crate) config: InventoryConfig,
}

impl<S: StoreView + ?Sized> std::fmt::Debug for InventoryService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Send order: authenticated adds, removes, mailbox, append-only.
fn send_rank(entry: &SnapshotEntry) -> u8 {
    match (entry.kind, entry.is_tombstone) {
        (EntryKind::Authenticated, false) => 0,
        (_, true) => 1,
        (EntryKind::Mailbox, false) => 2,
        (EntryKind::AppendOnly, false) => 3,
    }
}

impl<S: StoreView + ?Sized> InventoryService<S> {
    pub fn new(store: Arc<S>, config: InventoryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Digest of everything retained locally.
    pub fn build_filter(&self) -> DataFilter {
        DataFilter::from_snapshot(&self.store.snapshot(), self.config.max_filter_entries)
    }

    /// Local entries the peer lacks or holds an older version of.
    pub fn find_missing(&self, peer_filter: &DataFilter) -> Vec<SnapshotEntry> {
        self.store
            .snapshot()
            .into_iter()
            .filter(|entry| peer_filter.is_missing(entry))
            .collect()
    }

    /// Missing entries in send order, cut at the byte budget.
    pub fn build_inventory(&self, peer_filter: &DataFilter) -> Inventory {
        let mut missing = self.find_missing(peer_filter);
        missing.sort_by_key(|entry| (send_rank(entry), Reverse(entry.priority), entry.key));

        let budget = self.config.max_size_bytes();
        let mut used = 0usize;
        let mut inventory = Inventory::default();
        for entry in &missing {
            // Gone since the snapshot.
            let Some(request) = self.store.request(entry.kind, &entry.key) else {
                continue;
            };
            let size = request.serialized_size();
            if used.saturating_add(size) > budget {
                inventory.max_size_reached = true;
                break;
            }
            used += size;
            inventory.entries.push(request);
        }

        debug!(
            missing = missing.len(),
            sent = inventory.entries.len(),
            bytes = used,
            max_size_reached = inventory.max_size_reached,
            "[vn-03] Inventory built"
        );
        inventory
    }

    /// Responder side of a round.
    pub fn handle_request(
        &self,
        request: InventoryRequest,
    ) -> Result<InventoryResponse, InventoryError> {
        let max = self.config.max_filter_entries;
        if request.filter.len() > max {
            return Err(InventoryError::FilterTooLarge {
                len: request.filter.len(),
                max,
            });
        }
        let filter = request.filter.normalized();
        Ok(InventoryResponse {
            inventory: self.build_inventory(&filter),
            request_nonce: request.nonce,
        })
    }

    /// Apply received entries through the store's normal path.
    pub fn ingest(&self, inventory: Inventory) -> IngestReport {
        let mut report = IngestReport::default();
        for request in inventory.entries {
            let kind = request.kind();
            let key = request.key();
            match self.store.apply(request) {
                Ok(outcome) => report.record(Some(outcome)),
                Err(err) => {
                    debug!(%kind, %key, error = %err, "[vn-03] Inventory entry rejected");
                    report.record(None);
                }
            }
        }
        report
    }
}
