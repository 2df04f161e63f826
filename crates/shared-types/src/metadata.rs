//! # Storage Metadata
//!
//! Per-type bounds attached to every stored entry.

use crate::errors::MetaDataError;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Lifetime and capacity bounds for one data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaData {
    /// Time-to-live in milliseconds.
    pub ttl_ms: u64,
    /// Relative priority when building bounded inventories (higher first).
    pub priority: i32,
    /// Type tag used to scope keys and map bounds.
    pub type_name: String,
    /// Maximum number of entries of this type the store tolerates.
    pub max_map_size: usize,
}

impl MetaData {
    /// 2 days.
    pub const TTL_2_DAYS: u64 = 2 * DAY_MS;
    /// 10 days.
    pub const TTL_10_DAYS: u64 = 10 * DAY_MS;
    /// 15 days.
    pub const TTL_15_DAYS: u64 = 15 * DAY_MS;
    /// 30 days.
    pub const TTL_30_DAYS: u64 = 30 * DAY_MS;

    /// Priority for entries that should be synced first.
    pub const HIGH_PRIORITY: i32 = 1;
    /// Default priority.
    pub const DEFAULT_PRIORITY: i32 = 0;
    /// Priority for bulk entries.
    pub const LOW_PRIORITY: i32 = -1;

    /// Small maps (e.g. role registrations).
    pub const MAX_MAP_SIZE_100: usize = 100;
    /// Medium maps.
    pub const MAX_MAP_SIZE_1000: usize = 1_000;
    /// Default map bound.
    pub const MAX_MAP_SIZE_10_000: usize = 10_000;

    /// Metadata with default priority and map bound.
    pub fn new(ttl: Duration, type_name: impl Into<String>) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as u64,
            priority: Self::DEFAULT_PRIORITY,
            type_name: type_name.into(),
            max_map_size: Self::MAX_MAP_SIZE_10_000,
        }
    }

    /// Override priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Override the map bound.
    #[must_use]
    pub fn with_max_map_size(mut self, max_map_size: usize) -> Self {
        self.max_map_size = max_map_size;
        self
    }

    /// TTL as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Instant at which something created at `since` expires.
    pub fn expires_at(&self, since: Timestamp) -> Timestamp {
        since.saturating_add_millis(self.ttl_ms)
    }

    /// `since + ttl <= now`.
    pub fn is_expired(&self, since: Timestamp, now: Timestamp) -> bool {
        self.expires_at(since) <= now
    }

    /// Reject metadata that could never be stored.
    pub fn validate(&self) -> Result<(), MetaDataError> {
        if self.ttl_ms == 0 {
            return Err(MetaDataError::ZeroTtl);
        }
        if self.type_name.trim().is_empty() {
            return Err(MetaDataError::EmptyTypeName);
        }
        if self.max_map_size == 0 {
            return Err(MetaDataError::ZeroMaxMapSize);
        }
        Ok(())
    }
}
