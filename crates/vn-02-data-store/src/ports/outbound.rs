//! # Outbound Ports (Driven Ports)
//!
//! What the store needs from its host.

use crate::domain::errors::StorageError;
use crate::domain::snapshot::StoreSnapshot;

/// Durable home for store snapshots.
///
/// Production: [`FilePersistence`](crate::FilePersistence)
/// Testing: [`InMemoryPersistence`](crate::InMemoryPersistence)
pub trait PersistencePort: Send + Sync {
    /// The last saved snapshot, or `None` on first start.
    fn load_snapshot(&self) -> Result<Option<StoreSnapshot>, StorageError>;

    /// Replace the saved snapshot.
    fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError>;
}
