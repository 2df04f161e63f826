//! `StoreView` over the data store.

use crate::ports::outbound::StoreView;
use vn_02_data_store::{
    DataRequest, DataStore, EntryKind, SnapshotEntry, StorageError, StorageKey, StorageOutcome,
};

impl StoreView for DataStore {
    fn snapshot(&self) -> Vec<SnapshotEntry> {
        DataStore::snapshot(self)
    }

    fn request(&self, kind: EntryKind, key: &StorageKey) -> Option<DataRequest> {
        DataStore::request(self, kind, key)
    }

    fn apply(&self, request: DataRequest) -> Result<StorageOutcome, StorageError> {
        DataStore::apply(self, request)
    }
}
