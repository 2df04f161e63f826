//! Store domain: entries, requests, records and outcomes.

pub mod errors;
pub mod events;
pub mod keys;
pub mod outcome;
pub mod record;
pub mod requests;
pub mod snapshot;
pub(crate) mod validation;

pub use errors::StorageError;
pub use events::StoreEvent;
pub use keys::{append_only_key, authenticated_key, mailbox_key, StorageKey};
pub use outcome::StorageOutcome;
pub use record::{Authority, Record, Slot};
pub use requests::{
    AppendOnlyData, AppendOnlyEntry, AuthenticatedData, AuthenticatedEntry, DataRequest,
    EntryKind, MailboxData, MailboxEntry, RemoveRequest,
};
pub use snapshot::{SnapshotEntry, StoreCounts, StoreSnapshot};
pub use validation::Limits;
