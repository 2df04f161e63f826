//! # Data Store Subsystem
//!
//! Replicated storage for three kinds of entries, each in its own map:
//!
//! | Kind | Key | Mutable | Removable by |
//! |------|-----|---------|--------------|
//! | `Authenticated` | hash(type, owner, id) | yes, by sequence number | owner |
//! | `Mailbox` | hash(type, sender, receiver, message id) | yes, by sequence number | sender or receiver |
//! | `AppendOnly` | hash(content) | no | nobody (TTL only) |
//!
//! ## Rules
//!
//! - Every request is validated before it touches a map: structure, request
//!   expiry, content hash, then signature.
//! - A write is accepted only with a sequence number strictly above the one
//!   stored for its key. Identical resubmissions report `AlreadyReceived`.
//! - Removes leave tombstones and expiry leaves markers, both carrying the
//!   last sequence number, so delayed adds cannot resurrect an entry.
//! - Each `type_name` is bounded by its `max_map_size`; the lowest sequence
//!   numbers are evicted first.
//!
//! ## Architecture
//!
//! - **Domain Layer:** requests, records, keys, validation, outcomes
//! - **Ports Layer:** `PersistencePort`
//! - **Service Layer:** `DataStore`, the TTL sweeper
//! - **Adapters Layer:** in-memory and file persistence
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use shared_crypto::Ed25519KeyPair;
//! use shared_types::{MetaData, Timestamp};
//! use vn_02_data_store::{AuthenticatedData, AuthenticatedEntry, DataStore, StorageOutcome};
//!
//! let store = DataStore::default();
//! let owner = Ed25519KeyPair::generate();
//! let data = AuthenticatedData::new(MetaData::new(Duration::from_secs(60), "Offer"), "o1", vec![1]);
//! let entry = AuthenticatedEntry::sign(data, &owner, 1, Timestamp::now());
//!
//! assert_eq!(store.add_authenticated(entry.clone()).unwrap(), StorageOutcome::Added);
//! assert_eq!(store.add_authenticated(entry).unwrap(), StorageOutcome::AlreadyReceived);
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::persistence::{FilePersistence, InMemoryPersistence};
pub use domain::{
    append_only_key, authenticated_key, mailbox_key, AppendOnlyData, AppendOnlyEntry, Authority,
    AuthenticatedData, AuthenticatedEntry, DataRequest, EntryKind, Limits, MailboxData,
    MailboxEntry, Record, RemoveRequest, SnapshotEntry, Slot, StorageError, StorageKey,
    StorageOutcome, StoreCounts, StoreEvent, StoreSnapshot,
};
pub use ports::outbound::PersistencePort;
pub use service::{spawn_sweeper, DataStore, StoreConfig};
