//! # Shared Types Crate
//!
//! Value types that every overlay subsystem agrees on.
//!
//! ## Contents
//!
//! | Module | Types |
//! |--------|-------|
//! | `address` | `Address`, `TransportType` |
//! | `metadata` | `MetaData` (TTL, priority, type tag, map bound) |
//! | `time` | `Timestamp`, `TimeSource`, `SystemTimeSource` |
//! | `network_id` | `NetworkId` (reachable addresses + public key) |
//! | `errors` | `AddressError`, `MetaDataError` |
//!
//! ## Design Principles
//!
//! - **Derived classification**: the transport type of an address is computed
//!   from its host, never stored next to it.
//! - **Normalized hosts**: `localhost` never survives construction.

pub mod address;
pub mod errors;
pub mod metadata;
pub mod network_id;
pub mod time;

pub use address::{Address, TransportType};
pub use errors::{AddressError, MetaDataError};
pub use metadata::MetaData;
pub use network_id::{key_id, NetworkId};
pub use time::{SystemTimeSource, TimeSource, Timestamp};

#[cfg(any(test, feature = "test-utils"))]
pub use time::ManualTimeSource;
