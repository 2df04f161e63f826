//! Result of applying a well-formed request.

/// What an accepted (validated) request did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOutcome {
    /// Stored as new or as a newer version.
    Added,
    /// Tombstone stored.
    Removed,
    /// Byte-identical to what is already stored.
    AlreadyReceived,
    /// Sequence number not above the stored one; nothing changed.
    RejectedStale { stored: i32, incoming: i32 },
}

impl StorageOutcome {
    /// True if the store changed.
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}
