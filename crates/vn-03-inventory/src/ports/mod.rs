//! Ports of the inventory subsystem.

pub mod outbound;

pub use outbound::{InventoryPeer, StoreView};
