//! # Inventory Subsystem
//!
//! Anti-entropy for the data store. A peer sends a compact filter of what
//! it holds; the other side answers with the entries the filter shows to be
//! missing or outdated, in priority order and under a byte budget.
//!
//! | Local entry | Peer filter | Sent? |
//! |-------------|-------------|-------|
//! | any | hash absent | yes |
//! | authenticated/mailbox, seq `s` | hash with seq `< s` | yes |
//! | authenticated/mailbox, seq `s` | hash with seq `>= s` | no |
//! | append-only | hash present | no |
//!
//! Tombstones take part like adds, so removals propagate.
//!
//! ## Architecture
//!
//! - **Domain Layer:** `FilterEntry`, `DataFilter`, `Inventory`, limits
//! - **Ports Layer:** `StoreView`, `InventoryPeer`
//! - **Service Layer:** `InventoryService` (both roles and the round driver)
//! - **Adapters Layer:** `StoreView` for `DataStore`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use domain::{
    DataFilter, FilterEntry, IngestReport, Inventory, InventoryConfig, InventoryError,
    InventoryRequest, InventoryResponse, MAX_ENTRIES,
};
pub use ports::{InventoryPeer, StoreView};
pub use service::{InventoryService, ReconcileReport};
