//! Local network load and its history.
//!
//! Load is a weighted sum of recent traffic and store size in `[0, 1]`.
//! It scales the proof-of-work difficulty a peer demands, so a busy node
//! asks for more work.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const MB: f64 = 1024.0 * 1024.0;

/// A load value plus the user-set difficulty multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkLoad {
    pub load: f64,
    pub difficulty_adjustment_factor: f64,
}

impl NetworkLoad {
    pub const MIN_LOAD: f64 = 0.0;
    pub const MAX_LOAD: f64 = 1.0;
    pub const DEFAULT_DIFFICULTY_ADJUSTMENT: f64 = 1.0;
    pub const MIN_DIFFICULTY_ADJUSTMENT: f64 = 0.0;
    pub const MAX_DIFFICULTY_ADJUSTMENT: f64 = 100.0;

    /// Assumed for a peer before its handshake has been seen.
    pub const INITIAL: NetworkLoad = NetworkLoad {
        load: 0.01,
        difficulty_adjustment_factor: Self::DEFAULT_DIFFICULTY_ADJUSTMENT,
    };

    /// Clamp both parts into their valid ranges. NaN falls back to the defaults.
    pub fn new(load: f64, difficulty_adjustment_factor: f64) -> Self {
        let load = if load.is_nan() {
            Self::INITIAL.load
        } else {
            load.clamp(Self::MIN_LOAD, Self::MAX_LOAD)
        };
        let factor = if difficulty_adjustment_factor.is_nan() {
            Self::DEFAULT_DIFFICULTY_ADJUSTMENT
        } else {
            difficulty_adjustment_factor
                .clamp(Self::MIN_DIFFICULTY_ADJUSTMENT, Self::MAX_DIFFICULTY_ADJUSTMENT)
        };
        Self {
            load,
            difficulty_adjustment_factor: factor,
        }
    }

    /// Load derived from one hour of activity.
    pub fn calculate(inputs: &LoadInputs, difficulty_adjustment_factor: f64) -> Self {
        let impacts = [
            inputs.num_connections as f64 / 30.0 * 0.1,
            inputs.sent_bytes as f64 / (20.0 * MB) * 0.1,
            inputs.messages_sent as f64 / 2000.0 * 0.1,
            inputs.received_bytes as f64 / (20.0 * MB) * 0.1,
            inputs.messages_received as f64 / 1000.0 * 0.1,
            inputs.database_size_bytes as f64 / (100.0 * MB) * 0.3,
        ];
        Self::new(impacts.iter().sum(), difficulty_adjustment_factor)
    }
}

impl Default for NetworkLoad {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Activity counters over the last hour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadInputs {
    pub num_connections: usize,
    pub sent_bytes: u64,
    pub messages_sent: u64,
    pub received_bytes: u64,
    pub messages_received: u64,
    pub database_size_bytes: u64,
}

/// Current load plus the one it replaced.
///
/// Verification accepts work minted against either, since a peer may still
/// be using the value from before our last update.
#[derive(Debug)]
pub struct NetworkLoadSnapshot {
    inner: RwLock<(NetworkLoad, Option<NetworkLoad>)>,
}

impl NetworkLoadSnapshot {
    pub fn new(initial: NetworkLoad) -> Self {
        Self {
            inner: RwLock::new((initial, None)),
        }
    }

    pub fn current(&self) -> NetworkLoad {
        self.inner.read().0
    }

    pub fn previous(&self) -> Option<NetworkLoad> {
        self.inner.read().1
    }

    pub fn update(&self, load: NetworkLoad) {
        let mut inner = self.inner.write();
        let current = inner.0;
        *inner = (load, Some(current));
    }
}

impl Default for NetworkLoadSnapshot {
    fn default() -> Self {
        Self::new(NetworkLoad::INITIAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_node_has_zero_load() {
        let load = NetworkLoad::calculate(&LoadInputs::default(), 1.0);
        assert_eq!(load.load, 0.0);
    }

    #[test]
    fn test_connection_weight() {
        let inputs = LoadInputs {
            num_connections: 30,
            ..Default::default()
        };
        let load = NetworkLoad::calculate(&inputs, 1.0);
        assert!((load.load - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_load_is_clamped() {
        let inputs = LoadInputs {
            database_size_bytes: u64::MAX / 2,
            ..Default::default()
        };
        assert_eq!(NetworkLoad::calculate(&inputs, 1.0).load, 1.0);
        assert_eq!(NetworkLoad::new(f64::NAN, 500.0), NetworkLoad::new(0.01, 100.0));
    }

    #[test]
    fn test_snapshot_keeps_previous() {
        let snapshot = NetworkLoadSnapshot::default();
        assert_eq!(snapshot.previous(), None);

        let busy = NetworkLoad::new(0.5, 1.0);
        snapshot.update(busy);
        assert_eq!(snapshot.current(), busy);
        assert_eq!(snapshot.previous(), Some(NetworkLoad::INITIAL));
    }
}
