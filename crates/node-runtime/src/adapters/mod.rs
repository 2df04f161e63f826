//! # Adapter Implementations
//!
//! Implementations of subsystem outbound ports on top of the node's
//! connections.

pub mod inventory_peer;

pub use inventory_peer::ConnectionInventoryPeer;
