//! # Outbound Ports (Driven Ports)

use crate::domain::errors::InventoryError;
use crate::domain::inventory::{InventoryRequest, InventoryResponse};
use async_trait::async_trait;
use vn_02_data_store::{
    DataRequest, EntryKind, SnapshotEntry, StorageError, StorageKey, StorageOutcome,
};

/// The slice of the data store reconciliation needs.
///
/// Production: `DataStore` (adapters/store.rs)
pub trait StoreView: Send + Sync {
    /// Live adds and unexpired tombstones.
    fn snapshot(&self) -> Vec<SnapshotEntry>;

    /// Wire request for a stored record, if it still exists.
    fn request(&self, kind: EntryKind, key: &StorageKey) -> Option<DataRequest>;

    /// Normal ingestion path, with full validation.
    fn apply(&self, request: DataRequest) -> Result<StorageOutcome, StorageError>;
}

/// A connected peer that answers inventory requests.
#[async_trait]
pub trait InventoryPeer: Send + Sync {
    /// For logs and errors.
    fn label(&self) -> String;

    async fn request_inventory(
        &self,
        request: InventoryRequest,
    ) -> Result<InventoryResponse, InventoryError>;
}
