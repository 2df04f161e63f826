//! Inventory domain: filters, inventories and their limits.

pub mod config;
pub mod errors;
pub mod filter;
pub mod inventory;

pub use config::InventoryConfig;
pub use errors::InventoryError;
pub use filter::{DataFilter, FilterEntry, MAX_ENTRIES};
pub use inventory::{IngestReport, Inventory, InventoryRequest, InventoryResponse};
