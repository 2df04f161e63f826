//! # Time
//!
//! Millisecond timestamps and an injectable clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Wrap a raw millisecond value.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Raw milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Add milliseconds, saturating at `u64::MAX`.
    pub fn saturating_add_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Add a duration, saturating.
    pub fn saturating_add(self, duration: Duration) -> Self {
        self.saturating_add_millis(duration.as_millis() as u64)
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Abstract clock.
///
/// Production code uses [`SystemTimeSource`]; tests inject a controllable
/// source so TTL boundaries can be asserted exactly.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    /// Create a new system time source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod manual {
    use super::{TimeSource, Timestamp};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Time source that only moves when told to.
    #[derive(Debug, Default)]
    pub struct ManualTimeSource {
        millis: AtomicU64,
    }

    impl ManualTimeSource {
        /// Start at the given instant.
        pub fn new(start: Timestamp) -> Self {
            Self {
                millis: AtomicU64::new(start.as_millis()),
            }
        }

        /// Jump to an absolute instant.
        pub fn set(&self, now: Timestamp) {
            self.millis.store(now.as_millis(), Ordering::SeqCst);
        }

        /// Move forward.
        pub fn advance(&self, by: Duration) {
            self.millis
                .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl TimeSource for ManualTimeSource {
        fn now(&self) -> Timestamp {
            Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use manual::ManualTimeSource;
