//! Reconciliation limits.

use crate::domain::filter::MAX_ENTRIES;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Byte budget of one inventory response.
    pub max_size_kb: usize,
    /// How long to wait for one response.
    pub request_timeout: Duration,
    /// Peers reconciled with in parallel.
    pub max_peers: usize,
    /// Rounds per peer while responses report `max_size_reached`.
    pub max_rounds: usize,
    /// Filter entry cap, for both built and accepted filters.
    pub max_filter_entries: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_size_kb: 2000,
            request_timeout: Duration::from_secs(30),
            max_peers: 4,
            max_rounds: 10,
            max_filter_entries: MAX_ENTRIES,
        }
    }
}

impl InventoryConfig {
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_kb.saturating_mul(1024)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_millis(500),
            ..Self::default()
        }
    }
}
